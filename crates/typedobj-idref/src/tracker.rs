//! # Reference Tracker
//!
//! Accumulates [`IdReference`] occurrences during validation and indexes
//! them by location, which is what the relabeling pass walks.
//!
//! The tracker optionally bounds the number of *unique* `(type, id)` pairs.
//! Repeated occurrences of an already-seen ID are still recorded but do not
//! count against the limit.

use std::collections::{BTreeSet, HashMap, HashSet};

use typedobj_core::DocumentPath;

use crate::error::IdError;
use crate::reference::{IdReference, IdReferenceType};

/// Path-indexed collection of ID occurrences.
#[derive(Debug, Clone, Default)]
pub struct IdReferenceTracker {
    references: Vec<IdReference>,
    unique: HashSet<(IdReferenceType, String)>,
    by_location: HashMap<(DocumentPath, bool), usize>,
    max_unique: Option<u64>,
}

impl IdReferenceTracker {
    /// An unbounded tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker that fails once more than `max` unique IDs are seen.
    pub fn with_max_unique_ids(max: u64) -> Self {
        Self {
            max_unique: Some(max),
            ..Self::default()
        }
    }

    /// The configured unique-ID limit.
    pub fn max_unique_ids(&self) -> Option<u64> {
        self.max_unique
    }

    /// Rebuild an unbounded tracker from occurrences collected elsewhere,
    /// typically a finished validation report.
    pub fn extract<'a>(references: impl IntoIterator<Item = &'a IdReference>) -> Self {
        let mut tracker = Self::new();
        for reference in references {
            tracker
                .unique
                .insert((reference.id_type.clone(), reference.id.clone()));
            tracker.record(reference.clone());
        }
        tracker
    }

    /// Record one occurrence.
    pub fn add(&mut self, reference: IdReference) -> Result<(), IdError> {
        let key = (reference.id_type.clone(), reference.id.clone());
        if self.unique.insert(key) {
            if let Some(max) = self.max_unique {
                if self.unique.len() as u64 > max {
                    return Err(IdError::TooManyIds(max));
                }
            }
        }
        self.record(reference);
        Ok(())
    }

    fn record(&mut self, reference: IdReference) {
        self.by_location
            .entry((reference.location.clone(), reference.is_field_name))
            .or_insert(self.references.len());
        self.references.push(reference);
    }

    /// All occurrences in discovery order.
    pub fn references(&self) -> &[IdReference] {
        &self.references
    }

    /// Consume the tracker, returning occurrences in discovery order.
    pub fn into_references(self) -> Vec<IdReference> {
        self.references
    }

    /// Number of recorded occurrences.
    pub fn len(&self) -> usize {
        self.references.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Number of distinct `(type, id)` pairs.
    pub fn unique_count(&self) -> usize {
        self.unique.len()
    }

    /// ID types that occurred at least once.
    pub fn id_types(&self) -> BTreeSet<&IdReferenceType> {
        self.references.iter().map(|r| &r.id_type).collect()
    }

    /// Distinct IDs of one type.
    pub fn ids_of_type(&self, id_type: &IdReferenceType) -> BTreeSet<&str> {
        self.references
            .iter()
            .filter(|r| r.id_type == *id_type)
            .map(|r| r.id.as_str())
            .collect()
    }

    /// The reference recorded at `location`, if any.
    pub fn at(&self, location: &DocumentPath, is_field_name: bool) -> Option<&IdReference> {
        self.by_location
            .get(&(location.clone(), is_field_name))
            .map(|&i| &self.references[i])
    }

    /// First location of an ID with exactly this type and attribute list.
    pub fn location_of(
        &self,
        id_type: &IdReferenceType,
        id: &str,
        attributes: &[String],
    ) -> Option<&DocumentPath> {
        self.references
            .iter()
            .find(|r| r.matches(id_type, id, attributes))
            .map(|r| &r.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use typedobj_core::PathSegment;

    fn ws() -> IdReferenceType {
        IdReferenceType::new("ws").unwrap()
    }

    fn path(parts: &[&str]) -> DocumentPath {
        DocumentPath::from_segments(
            parts
                .iter()
                .map(|p| match p.parse::<usize>() {
                    Ok(i) => PathSegment::Index(i),
                    Err(_) => PathSegment::Key((*p).to_string()),
                })
                .collect(),
        )
    }

    #[test]
    fn test_key_and_value_share_location() {
        let mut tracker = IdReferenceTracker::new();
        tracker
            .add(IdReference::value(ws(), "a", vec![], path(&["m", "c"])))
            .unwrap();
        tracker
            .add(IdReference::field_name(ws(), "c", vec![], path(&["m", "c"])))
            .unwrap();
        assert_eq!(tracker.at(&path(&["m", "c"]), false).unwrap().id, "a");
        assert_eq!(tracker.at(&path(&["m", "c"]), true).unwrap().id, "c");
        assert!(tracker.at(&path(&["m"]), false).is_none());
    }

    #[test]
    fn test_unique_limit_counts_distinct_ids_only() {
        let mut tracker = IdReferenceTracker::with_max_unique_ids(2);
        for (i, id) in ["a", "b", "a", "b", "a"].iter().enumerate() {
            tracker
                .add(IdReference::value(ws(), *id, vec![], path(&["x", &i.to_string()])))
                .unwrap();
        }
        assert_eq!(tracker.len(), 5);
        assert_eq!(tracker.unique_count(), 2);
        let err = tracker
            .add(IdReference::value(ws(), "c", vec![], path(&["y"])))
            .unwrap_err();
        assert_eq!(err.to_string(), "Maximum ID count of 2 exceeded");
    }

    #[test]
    fn test_same_id_different_types_are_distinct() {
        let mut tracker = IdReferenceTracker::with_max_unique_ids(1);
        tracker
            .add(IdReference::value(ws(), "a", vec![], path(&["p"])))
            .unwrap();
        let other = IdReferenceType::new("foo").unwrap();
        assert!(tracker
            .add(IdReference::value(other, "a", vec![], path(&["q"])))
            .is_err());
    }

    #[test]
    fn test_extract_rebuilds_index() {
        let refs = vec![
            IdReference::value(ws(), "a", vec![], path(&["m", "c"])),
            IdReference::field_name(ws(), "c", vec![], path(&["m", "c"])),
            IdReference::value(ws(), "a", vec![], path(&["m", "z"])),
        ];
        let tracker = IdReferenceTracker::extract(&refs);
        assert_eq!(tracker.len(), 3);
        assert_eq!(tracker.unique_count(), 2);
        assert_eq!(tracker.at(&path(&["m", "c"]), true).unwrap().id, "c");
        assert_eq!(tracker.max_unique_ids(), None);
    }

    #[test]
    fn test_location_of_returns_first_match() {
        let foo1 = IdReferenceType::new("foo1").unwrap();
        let attrib = vec!["Attrib".to_string()];
        let mut tracker = IdReferenceTracker::new();
        tracker
            .add(IdReference::value(foo1.clone(), "a1", attrib.clone(), path(&["att", "0"])))
            .unwrap();
        tracker
            .add(IdReference::value(foo1.clone(), "a1", attrib.clone(), path(&["att", "3"])))
            .unwrap();
        assert_eq!(
            tracker.location_of(&foo1, "a1", &attrib).unwrap().to_string(),
            "/att/0"
        );
        assert!(tracker.location_of(&foo1, "a1", &[]).is_none());
        assert_eq!(tracker.ids_of_type(&foo1).len(), 1);
    }
}
