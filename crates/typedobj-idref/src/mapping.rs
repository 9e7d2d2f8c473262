//! # ID Mapping and Resolution
//!
//! The engine never resolves IDs itself. After validation the caller hands
//! the collected references to an [`IdResolver`], which answers with an
//! [`IdMapping`] from raw IDs to their canonical replacements.
//!
//! Mappings can be type-agnostic (`z → y` for every ID type) or scoped to
//! one ID type; a scoped entry wins over a type-agnostic one.

use std::collections::HashMap;

use crate::error::ResolveError;
use crate::reference::{IdReference, IdReferenceType};

/// Replacement strings for raw IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    any_type: HashMap<String, String>,
    by_type: HashMap<IdReferenceType, HashMap<String, String>>,
}

impl IdMapping {
    /// An empty mapping; relabeling with it changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `id` with `replacement` regardless of ID type.
    pub fn insert(&mut self, id: impl Into<String>, replacement: impl Into<String>) {
        self.any_type.insert(id.into(), replacement.into());
    }

    /// Replace `id` with `replacement` for one ID type only.
    pub fn insert_for_type(
        &mut self,
        id_type: IdReferenceType,
        id: impl Into<String>,
        replacement: impl Into<String>,
    ) {
        self.by_type
            .entry(id_type)
            .or_default()
            .insert(id.into(), replacement.into());
    }

    /// The replacement for an ID, if one is mapped.
    pub fn lookup(&self, id_type: &IdReferenceType, id: &str) -> Option<&str> {
        self.by_type
            .get(id_type)
            .and_then(|m| m.get(id))
            .or_else(|| self.any_type.get(id))
            .map(String::as_str)
    }

    /// Whether no replacements are mapped.
    pub fn is_empty(&self) -> bool {
        self.any_type.is_empty() && self.by_type.values().all(HashMap::is_empty)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

/// Caller-supplied resolution of collected ID references.
pub trait IdResolver {
    /// Produce canonical replacements for the given occurrences.
    fn resolve(&self, references: &[IdReference]) -> Result<IdMapping, ResolveError>;
}

impl IdResolver for IdMapping {
    fn resolve(&self, _references: &[IdReference]) -> Result<IdMapping, ResolveError> {
        Ok(self.clone())
    }
}

impl<F> IdResolver for F
where
    F: Fn(&[IdReference]) -> Result<IdMapping, ResolveError>,
{
    fn resolve(&self, references: &[IdReference]) -> Result<IdMapping, ResolveError> {
        self(references)
    }
}
