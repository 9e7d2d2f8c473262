//! # Schema Nodes
//!
//! A compiled type schema is a tree of [`SchemaNode`]s. Each node describes
//! one value: an object, an array, or a scalar. Nodes are immutable once
//! compiled and may be shared read-only across concurrent validations.
//!
//! ## Schema document format
//!
//! ```json
//! {
//!   "id": "IDMap",
//!   "type": "object",
//!   "id-reference": {"id-type": "ws", "attributes": ["Attrib"]},
//!   "searchable-ws-subset": {"fields": {}, "keys": {}},
//!   "metadata-ws": {"name": "m", "count": "length(m)"},
//!   "properties": {"m": {"type": "string"}},
//!   "additionalProperties": false,
//!   "required": ["m"]
//! }
//! ```
//!
//! Arrays use `items` (one schema for every element, or a list of schemas
//! for a tuple) with optional `minItems` / `maxItems`. Integer and number
//! nodes accept `minimum` / `maximum` with `exclusiveMinimum` /
//! `exclusiveMaximum`.
//!
//! Object `properties` keep their declaration order; it is the order used
//! when an error lists the allowed property names.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use typedobj_idref::IdReferenceType;

use crate::error::SchemaError;

const VALID_TYPEDEF_NAMES: &str = "valid-typedef-names";
const ATTRIBUTES: &str = "attributes";

/// ID type and attributes declared by an `id-reference` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSpec {
    /// The ID type, e.g. `ws`.
    pub id_type: IdReferenceType,
    /// Attributes passed through to the resolver.
    pub attributes: Vec<String>,
}

/// Annotations common to every node kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMeta {
    /// The schema `id`, if given.
    pub id: Option<String>,
    /// The type name in the source type language, if given.
    pub original_type: Option<String>,
    /// Present when this node's values (or, for objects, keys) are IDs.
    pub id_reference: Option<ReferenceSpec>,
    /// Opaque subset description reported once per object instance.
    pub searchable_subset: Option<Value>,
    /// Object metadata selection: metadata name to field expression.
    pub metadata_ws: Option<Value>,
}

/// Scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Any string.
    String,
    /// Whole numbers only.
    Integer,
    /// Any number; rendered as `Float` in messages.
    Number,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "String",
            Self::Integer => "Integer",
            Self::Number => "Float",
        })
    }
}

/// What to do with object fields not named in `properties`.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalPolicy {
    /// Unknown fields are errors (when `properties` is non-empty).
    Disallowed,
    /// Unknown fields are skipped without checking.
    Allowed,
    /// Unknown fields are validated against this schema (mappings).
    TypedBy(Box<SchemaNode>),
}

/// How array elements map to schemas.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItemPolicy {
    /// Every element uses the same schema (lists).
    Homogeneous(Box<SchemaNode>),
    /// Element `i` uses schema `i`; elements past the end are unchecked.
    Tuple(Vec<SchemaNode>),
    /// No item schema was declared.
    Any,
}

/// One end of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBound<T> {
    /// The bound itself.
    pub value: T,
    /// Whether the bound is excluded from the accepted range.
    pub exclusive: bool,
}

/// Range constraint on an integer or number node.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericRange {
    /// Integer bounds, compared exactly.
    Integer {
        /// Lower bound, from `minimum` / `exclusiveMinimum`.
        minimum: Option<RangeBound<i128>>,
        /// Upper bound, from `maximum` / `exclusiveMaximum`.
        maximum: Option<RangeBound<i128>>,
    },
    /// Floating-point bounds.
    Number {
        /// Lower bound.
        minimum: Option<RangeBound<f64>>,
        /// Upper bound.
        maximum: Option<RangeBound<f64>>,
    },
}

/// An object node.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    /// Annotations.
    pub meta: NodeMeta,
    properties: Vec<(String, SchemaNode)>,
    property_index: HashMap<String, usize>,
    /// Policy for fields not named in `properties`.
    pub additional: AdditionalPolicy,
    required: Vec<String>,
    required_index: HashMap<String, usize>,
}

/// How a field of an object is to be checked.
#[derive(Debug, Clone, Copy)]
pub enum FieldRule<'a> {
    /// Validate against this schema.
    Typed(&'a SchemaNode),
    /// Skip without checking.
    Unchecked,
    /// Report as not allowed, then skip.
    Disallowed,
}

impl ObjectNode {
    /// Declared properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Schema of a declared property.
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.property_index.get(name).map(|&i| &self.properties[i].1)
    }

    /// Required field names; a field's position is its bitset index.
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Bitset index of a required field.
    pub fn required_index(&self, name: &str) -> Option<usize> {
        self.required_index.get(name).copied()
    }

    /// The rule for a field named `name`.
    pub fn field_rule(&self, name: &str) -> FieldRule<'_> {
        if let Some(node) = self.property(name) {
            return FieldRule::Typed(node);
        }
        match &self.additional {
            AdditionalPolicy::TypedBy(node) => FieldRule::Typed(node),
            AdditionalPolicy::Allowed => FieldRule::Unchecked,
            AdditionalPolicy::Disallowed if self.properties.is_empty() => FieldRule::Unchecked,
            AdditionalPolicy::Disallowed => FieldRule::Disallowed,
        }
    }

    /// Declared property names rendered as `[a, b]`.
    pub fn property_list(&self) -> String {
        bracket_list(self.properties.iter().map(|(k, _)| k.as_str()))
    }
}

/// An array node.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayNode {
    /// Annotations.
    pub meta: NodeMeta,
    /// Element schemas.
    pub items: ArrayItemPolicy,
    /// `minItems`, if declared.
    pub min_items: Option<usize>,
    /// `maxItems`, if declared.
    pub max_items: Option<usize>,
}

impl ArrayNode {
    /// The schema for the element at `index`, if any.
    pub fn item(&self, index: usize) -> Option<&SchemaNode> {
        match &self.items {
            ArrayItemPolicy::Homogeneous(node) => Some(node),
            ArrayItemPolicy::Tuple(nodes) => nodes.get(index),
            ArrayItemPolicy::Any => None,
        }
    }
}

/// A string, integer or number node.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarNode {
    /// Annotations.
    pub meta: NodeMeta,
    /// The accepted JSON type.
    pub kind: ScalarKind,
    /// Bounds for integer and number nodes.
    pub range: Option<NumericRange>,
}

/// One node of a compiled type schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// `"type": "object"`.
    Object(ObjectNode),
    /// `"type": "array"`.
    Array(ArrayNode),
    /// A string, integer or number.
    Scalar(ScalarNode),
}

impl SchemaNode {
    /// Compile a schema from JSON text.
    pub fn parse_str(document: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(document)?;
        Self::from_value(&value)
    }

    /// Compile a schema from an already parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        parse_node(value, "#")
    }

    /// Annotations of this node.
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Self::Object(n) => &n.meta,
            Self::Array(n) => &n.meta,
            Self::Scalar(n) => &n.meta,
        }
    }

    /// The schema `id`, if given.
    pub fn id(&self) -> Option<&str> {
        self.meta().id.as_deref()
    }

    /// The node kind as written in schema documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Scalar(s) => match s.kind {
                ScalarKind::String => "string",
                ScalarKind::Integer => "integer",
                ScalarKind::Number => "number",
            },
        }
    }
}

pub(crate) fn bracket_list<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined: Vec<&str> = items.collect();
    format!("[{}]", joined.join(", "))
}

fn parse_node(value: &Value, location: &str) -> Result<SchemaNode, SchemaError> {
    let data = value.as_object().ok_or_else(|| SchemaError::NotAnObject {
        location: location.to_string(),
    })?;
    let meta = NodeMeta {
        id: optional_string(data, "id", location)?,
        original_type: optional_string(data, "original-type", location)?,
        id_reference: parse_id_reference(data)?,
        searchable_subset: None,
        metadata_ws: None,
    };
    let type_name = data.get("type").and_then(Value::as_str);
    match type_name {
        Some("object") => parse_object(data, meta, location).map(SchemaNode::Object),
        Some("array") => parse_array(data, meta, location).map(SchemaNode::Array),
        Some("string") => Ok(SchemaNode::Scalar(ScalarNode {
            meta,
            kind: ScalarKind::String,
            range: None,
        })),
        Some("integer") => Ok(SchemaNode::Scalar(ScalarNode {
            meta,
            kind: ScalarKind::Integer,
            range: parse_integer_range(data, location)?,
        })),
        Some("number") => Ok(SchemaNode::Scalar(ScalarNode {
            meta,
            kind: ScalarKind::Number,
            range: parse_number_range(data, location)?,
        })),
        _ => Err(SchemaError::UnsupportedType {
            found: data
                .get("type")
                .map_or_else(|| "null".to_string(), |t| t.to_string()),
            location: location.to_string(),
        }),
    }
}

fn optional_string(
    data: &Map<String, Value>,
    field: &'static str,
    location: &str,
) -> Result<Option<String>, SchemaError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid(field, location, format!("expected a string, got {other}"))),
    }
}

fn invalid(field: &'static str, location: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidField {
        field,
        location: location.to_string(),
        reason: reason.into(),
    }
}

fn parse_metadata_ws(
    data: &Map<String, Value>,
    location: &str,
) -> Result<Option<Value>, SchemaError> {
    let selection = match data.get("metadata-ws") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(selection)) => selection,
        Some(_) => return Err(invalid("metadata-ws", location, "expected an object")),
    };
    if let Some((name, _)) = selection.iter().find(|(_, v)| !v.is_string()) {
        return Err(invalid(
            "metadata-ws",
            location,
            format!("expression for metadata '{name}' must be a string"),
        ));
    }
    Ok(Some(Value::Object(selection.clone())))
}

fn string_list(
    value: &Value,
    field: &'static str,
    location: &str,
) -> Result<Vec<String>, SchemaError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(field, location, "expected a list of strings"))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(field, location, "expected a list of strings"))
        })
        .collect()
}

fn parse_id_reference(data: &Map<String, Value>) -> Result<Option<ReferenceSpec>, SchemaError> {
    let Some(info) = data.get("id-reference") else {
        return Ok(None);
    };
    let info = info.as_object().ok_or(SchemaError::MissingIdType)?;
    let id_type = info
        .get("id-type")
        .and_then(Value::as_str)
        .ok_or(SchemaError::MissingIdType)?;
    let typedefs = info.get(VALID_TYPEDEF_NAMES).filter(|v| !v.is_null());
    let attribs = info.get(ATTRIBUTES).filter(|v| !v.is_null());
    if typedefs.is_some() && attribs.is_some() {
        return Err(SchemaError::ConflictingAttributes);
    }
    let attributes = match typedefs.or(attribs) {
        Some(list) => string_list(list, ATTRIBUTES, "#/id-reference")?,
        None => Vec::new(),
    };
    Ok(Some(ReferenceSpec {
        id_type: IdReferenceType::new(id_type)?,
        attributes,
    }))
}

fn parse_object(
    data: &Map<String, Value>,
    mut meta: NodeMeta,
    location: &str,
) -> Result<ObjectNode, SchemaError> {
    meta.searchable_subset = data
        .get("searchable-ws-subset")
        .filter(|v| !v.is_null())
        .cloned();
    meta.metadata_ws = parse_metadata_ws(data, location)?;

    let mut properties = Vec::new();
    let mut property_index = HashMap::new();
    match data.get("properties") {
        None | Some(Value::Null) => {}
        Some(Value::Object(props)) => {
            for (name, schema) in props {
                let child = parse_node(schema, &format!("{location}/properties/{name}"))?;
                property_index.insert(name.clone(), properties.len());
                properties.push((name.clone(), child));
            }
        }
        Some(_) => return Err(invalid("properties", location, "expected an object")),
    }

    let additional = match data.get("additionalProperties") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => AdditionalPolicy::Disallowed,
        Some(Value::Bool(true)) => AdditionalPolicy::Allowed,
        Some(schema @ Value::Object(_)) => AdditionalPolicy::TypedBy(Box::new(parse_node(
            schema,
            &format!("{location}/additionalProperties"),
        )?)),
        Some(_) => {
            return Err(invalid(
                "additionalProperties",
                location,
                "expected a boolean or a schema",
            ))
        }
    };

    let required = match data.get("required") {
        None | Some(Value::Null) => Vec::new(),
        Some(list) => string_list(list, "required", location)?,
    };
    let mut required_index = HashMap::new();
    for name in &required {
        let next = required_index.len();
        required_index.entry(name.clone()).or_insert(next);
    }
    let required = dedup_in_order(required);

    Ok(ObjectNode {
        meta,
        properties,
        property_index,
        additional,
        required,
        required_index,
    })
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

fn parse_array(
    data: &Map<String, Value>,
    meta: NodeMeta,
    location: &str,
) -> Result<ArrayNode, SchemaError> {
    let items = match data.get("items") {
        None | Some(Value::Null) => ArrayItemPolicy::Any,
        Some(schema @ Value::Object(_)) => ArrayItemPolicy::Homogeneous(Box::new(parse_node(
            schema,
            &format!("{location}/items"),
        )?)),
        Some(Value::Array(list)) => ArrayItemPolicy::Tuple(
            list.iter()
                .enumerate()
                .map(|(i, s)| parse_node(s, &format!("{location}/items/{i}")))
                .collect::<Result<_, _>>()?,
        ),
        Some(_) => return Err(invalid("items", location, "expected a schema or a list of schemas")),
    };
    Ok(ArrayNode {
        meta,
        items,
        min_items: item_count(data, "minItems", location)?,
        max_items: item_count(data, "maxItems", location)?,
    })
}

fn item_count(
    data: &Map<String, Value>,
    field: &'static str,
    location: &str,
) -> Result<Option<usize>, SchemaError> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(field, location, format!("expected a non-negative integer, got {v}"))),
    }
}

fn is_flag_set(data: &Map<String, Value>, field: &str) -> bool {
    matches!(data.get(field), Some(v) if !v.is_null() && *v != Value::Bool(false))
}

fn parse_integer_range(
    data: &Map<String, Value>,
    location: &str,
) -> Result<Option<NumericRange>, SchemaError> {
    // Fractional bounds round inwards; a rounded bound can no longer be exclusive.
    let bound = |field: &'static str,
                 flag: &str,
                 round: fn(f64) -> f64|
     -> Result<Option<RangeBound<i128>>, SchemaError> {
        let Some(v) = data.get(field).filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let exclusive = is_flag_set(data, flag);
        if let Some(i) = v.as_i64() {
            return Ok(Some(RangeBound { value: i128::from(i), exclusive }));
        }
        if let Some(u) = v.as_u64() {
            return Ok(Some(RangeBound { value: i128::from(u), exclusive }));
        }
        let f = v
            .as_f64()
            .ok_or_else(|| invalid(field, location, format!("expected a number, got {v}")))?;
        let rounded = round(f);
        Ok(Some(RangeBound {
            value: rounded as i128,
            exclusive: exclusive && rounded == f,
        }))
    };
    let minimum = bound("minimum", "exclusiveMinimum", f64::ceil)?;
    let maximum = bound("maximum", "exclusiveMaximum", f64::floor)?;
    if minimum.is_none() && maximum.is_none() {
        return Ok(None);
    }
    Ok(Some(NumericRange::Integer { minimum, maximum }))
}

fn parse_number_range(
    data: &Map<String, Value>,
    location: &str,
) -> Result<Option<NumericRange>, SchemaError> {
    let bound = |field: &'static str, flag: &str| -> Result<Option<RangeBound<f64>>, SchemaError> {
        let Some(v) = data.get(field).filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let value = v
            .as_f64()
            .ok_or_else(|| invalid(field, location, format!("expected a number, got {v}")))?;
        Ok(Some(RangeBound {
            value,
            exclusive: is_flag_set(data, flag),
        }))
    };
    let minimum = bound("minimum", "exclusiveMinimum")?;
    let maximum = bound("maximum", "exclusiveMaximum")?;
    if minimum.is_none() && maximum.is_none() {
        return Ok(None);
    }
    Ok(Some(NumericRange::Number { minimum, maximum }))
}
