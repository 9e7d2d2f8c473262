//! # ID References
//!
//! An [`IdReference`] is one occurrence of an ID inside an instance: the
//! raw string, the declared ID type and attributes from the schema, and the
//! exact document location. The same logical ID appearing twice yields two
//! references.
//!
//! An ID may live in a value (`{"ref": "<id>"}`) or in a field name when a
//! mapping's keys are IDs (`{"<id>": ...}`). Both kinds can share a
//! location: in `{"m": {"c": "a"}}` with ID keys and ID values, `c` and `a`
//! are both at `/m/c`, distinguished by [`IdReference::is_field_name`].

use std::fmt;

use serde::{Deserialize, Serialize};
use typedobj_core::DocumentPath;

use crate::error::IdError;

/// The declared type of an ID, e.g. `ws` for workspace object references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdReferenceType(String);

impl IdReferenceType {
    /// Validate and wrap an ID type name.
    pub fn new(name: impl Into<String>) -> Result<Self, IdError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IdError::BlankType);
        }
        Ok(Self(name))
    }

    /// The type name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One ID occurrence found during validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdReference {
    /// Declared ID type.
    pub id_type: IdReferenceType,
    /// The ID exactly as it appeared in the instance.
    pub id: String,
    /// Attributes declared alongside the ID type in the schema.
    pub attributes: Vec<String>,
    /// Where the ID was found.
    pub location: DocumentPath,
    /// True when the ID is an object key rather than a value.
    pub is_field_name: bool,
}

impl IdReference {
    /// An ID found in a string value.
    pub fn value(
        id_type: IdReferenceType,
        id: impl Into<String>,
        attributes: Vec<String>,
        location: DocumentPath,
    ) -> Self {
        Self {
            id_type,
            id: id.into(),
            attributes,
            location,
            is_field_name: false,
        }
    }

    /// An ID found in an object key.
    pub fn field_name(
        id_type: IdReferenceType,
        id: impl Into<String>,
        attributes: Vec<String>,
        location: DocumentPath,
    ) -> Self {
        Self {
            is_field_name: true,
            ..Self::value(id_type, id, attributes, location)
        }
    }

    /// Whether this occurrence carries the given type, ID and attributes.
    pub fn matches(&self, id_type: &IdReferenceType, id: &str, attributes: &[String]) -> bool {
        self.id_type == *id_type && self.id == id && self.attributes == attributes
    }
}
