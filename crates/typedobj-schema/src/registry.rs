//! # Schema Registry and Typed Validation
//!
//! The engine does not own the type registry. [`TypeProvider`] is the
//! boundary: given a [`TypeDefId`] it returns the compiled schema.
//! [`SchemaRegistry`] is a directory-backed provider used by the CLI and by
//! tests; production callers plug in their own.
//!
//! [`TypedObjectValidator`] ties a provider to a [`Validator`] and stamps
//! the report with the type that was validated.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use typedobj_core::{EngineConfig, TokenSource};

use crate::error::{RegistryError, SchemaError, ValidationError};
use crate::node::SchemaNode;
use crate::report::ValidationReport;
use crate::typedef::TypeDefId;
use crate::validator::Validator;

const SCHEMA_SUFFIX: &str = ".schema.json";

/// Source of compiled schemas.
pub trait TypeProvider {
    /// The schema for `type_id`.
    fn schema(&self, type_id: &TypeDefId) -> Result<Arc<SchemaNode>, RegistryError>;
}

/// In-memory map of compiled schemas, optionally loaded from a directory.
///
/// Schemas are keyed by their `id` (falling back to the file name without
/// `.schema.json`). Lookup tries the full type id first, then the
/// unversioned `Module.Type`, then the bare type name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<SchemaNode>>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.schema.json` file in `dir` (not recursive).
    pub fn from_dir(dir: &Path) -> Result<Self, RegistryError> {
        let io_err = |path: &Path, source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut registry = Self::new();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
            let path = entry.map_err(|e| io_err(dir, e))?.path();
            let is_schema = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(SCHEMA_SUFFIX));
            if is_schema && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            let node = SchemaNode::parse_str(&text).map_err(|source| RegistryError::Schema {
                path: path.clone(),
                source,
            })?;
            let key = match node.id() {
                Some(id) => id.to_string(),
                None => path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_suffix(SCHEMA_SUFFIX))
                    .unwrap_or_default()
                    .to_string(),
            };
            tracing::debug!(key = %key, path = %path.display(), "loaded type schema");
            registry.insert(key, node);
        }
        Ok(registry)
    }

    /// Register a compiled schema under `key`.
    pub fn insert(&mut self, key: impl Into<String>, node: SchemaNode) {
        self.schemas.insert(key.into(), Arc::new(node));
    }

    /// Compile and register a schema document.
    pub fn insert_document(&mut self, key: impl Into<String>, document: &str) -> Result<(), SchemaError> {
        let node = SchemaNode::parse_str(document)?;
        self.insert(key, node);
        Ok(())
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schemas are registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl TypeProvider for SchemaRegistry {
    fn schema(&self, type_id: &TypeDefId) -> Result<Arc<SchemaNode>, RegistryError> {
        [type_id.to_string(), type_id.type_string(), type_id.name().to_string()]
            .iter()
            .find_map(|key| self.schemas.get(key))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownType(type_id.clone()))
    }
}

impl<P: TypeProvider + ?Sized> TypeProvider for Arc<P> {
    fn schema(&self, type_id: &TypeDefId) -> Result<Arc<SchemaNode>, RegistryError> {
        (**self).schema(type_id)
    }
}

/// Validates instances by type id.
#[derive(Debug, Clone)]
pub struct TypedObjectValidator<P> {
    provider: P,
    max_unique_ids: Option<u64>,
}

impl<P: TypeProvider> TypedObjectValidator<P> {
    /// A validator with no unique-ID limit.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            max_unique_ids: None,
        }
    }

    /// A validator taking its unique-ID limit from configuration.
    pub fn from_config(provider: P, config: &EngineConfig) -> Self {
        Self {
            provider,
            max_unique_ids: Some(config.max_unique_ids),
        }
    }

    /// The schema provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Validate the document read from `source` as an instance of `type_id`.
    pub fn validate<T: TokenSource>(
        &self,
        type_id: &TypeDefId,
        source: T,
    ) -> Result<ValidationReport, ValidationError> {
        let schema = self.provider.schema(type_id)?;
        let span = tracing::debug_span!("validate", type_id = %type_id);
        let _guard = span.enter();
        let mut validator = Validator::new(&schema);
        if let Some(max) = self.max_unique_ids {
            validator = validator.with_max_unique_ids(max);
        }
        let mut report = validator.validate(source)?;
        report.type_id = Some(type_id.clone());
        Ok(report)
    }
}
