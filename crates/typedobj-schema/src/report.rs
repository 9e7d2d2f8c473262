//! # Validation Reports
//!
//! The outcome of one validation pass. Findings are data: a report with
//! errors is still a successful return from the validator.

use serde_json::Value;
use typedobj_core::DocumentPath;
use typedobj_idref::{IdReference, IdReferenceTracker};

use crate::typedef::TypeDefId;

/// Maximum number of error messages retained in a report.
pub const MAX_ERROR_COUNT: usize = 10;

/// A searchable subset annotation reported for one object instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchableSubset {
    /// Location of the object instance.
    pub location: DocumentPath,
    /// The annotation, passed through uninterpreted.
    pub subset: Value,
}

/// A `metadata-ws` selection reported for one object instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataSelectionAnnotation {
    /// Location of the object instance.
    pub location: DocumentPath,
    /// Metadata name to field expression, as declared.
    pub selection: Value,
}

/// Result of validating one instance.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub(crate) type_id: Option<TypeDefId>,
    pub(crate) errors: Vec<String>,
    pub(crate) error_count: usize,
    pub(crate) ids: IdReferenceTracker,
    pub(crate) searchable_subsets: Vec<SearchableSubset>,
    pub(crate) metadata_selections: Vec<MetadataSelectionAnnotation>,
}

impl ValidationReport {
    /// The validated type, when validation went through a type provider.
    pub fn type_id(&self) -> Option<&TypeDefId> {
        self.type_id.as_ref()
    }

    /// Whether no errors were found.
    pub fn is_valid(&self) -> bool {
        self.error_count == 0
    }

    /// The first [`MAX_ERROR_COUNT`] error messages in discovery order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Total number of errors found, including those not retained.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Every ID occurrence in discovery order.
    pub fn id_references(&self) -> &[IdReference] {
        self.ids.references()
    }

    /// The path-indexed ID occurrences, ready for relabeling.
    pub fn tracker(&self) -> &IdReferenceTracker {
        &self.ids
    }

    /// Consume the report, keeping only the ID occurrences.
    pub fn into_tracker(self) -> IdReferenceTracker {
        self.ids
    }

    /// Searchable subset annotations, one per annotated object instance.
    pub fn searchable_subsets(&self) -> &[SearchableSubset] {
        &self.searchable_subsets
    }

    /// `metadata-ws` selections, one per annotated object instance.
    pub fn metadata_selections(&self) -> &[MetadataSelectionAnnotation] {
        &self.metadata_selections
    }

    /// The selection declared on the document root, which is the one
    /// metadata is extracted with. `None` when the instance is invalid.
    pub fn root_metadata_selection(&self) -> Option<&Value> {
        if !self.is_valid() {
            return None;
        }
        self.metadata_selections
            .iter()
            .find(|s| s.location.is_root())
            .map(|s| &s.selection)
    }
}
