//! # Canonical Payloads
//!
//! A [`CanonicalPayload`] turns a validated document into its canonical
//! bytes: IDs relabeled, keys sorted, MD5 computed on the way out.
//!
//! ```text
//!   new ──calculate_relabeled_size()──▶ sized ──sort()──▶ sorted
//!    │                                    │                 │
//!    └──────────────── destroy() ─────────┴─────────────────┘──▶ destroyed
//! ```
//!
//! `sort()` computes the relabeled size itself when needed. Accessors
//! called before their step report a [`PayloadStateError`]. Destruction is
//! terminal and idempotent; [`CanonicalPayload::release_cached_resources`]
//! only drops the sorted output so that `sort()` can run again.
//!
//! The relabel pass notes whether every object's keys already came out in
//! order. Such a document skips the sorter entirely and is hashed as it is
//! relabeled. Otherwise, with a [`TempFilesManager`] the relabeled input is
//! spooled to a `sortinp` file (deleted when the sort ends) and sorted into
//! a `sortout` file; without one, everything stays in memory and the
//! document's own bytes count against the sort budget.
//!
//! A payload built with [`CanonicalPayload::with_metadata_selection`] can
//! also report the object metadata its type selects, read from the canonical
//! bytes once sorted or from a relabel pass before that.

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::sync::Arc;

use typedobj_core::{HashingWriter, JsonSource, Md5Digest, TokenStream};
use typedobj_idref::{
    relabel, relabel_to_vec, IdMapping, IdReferenceTracker, IdResolver, RelabelOutcome, ResolveError,
};

use crate::backing::{Backing, PayloadReader};
use crate::error::{PayloadError, PayloadStateError};
use crate::metadata::{extract_metadata, ExtractedMetadata, MetadataSelection};
use crate::sorter::KeySorter;
use crate::tempfiles::TempFilesManager;

/// A document on its way to canonical form.
#[derive(Debug)]
pub struct CanonicalPayload {
    source: JsonSource,
    tracker: IdReferenceTracker,
    mapping: IdMapping,
    metadata: Option<MetadataSelection>,
    relabeled: Option<RelabelOutcome>,
    output: Option<Backing>,
    md5: Option<Md5Digest>,
    destroyed: bool,
}

impl CanonicalPayload {
    /// Canonicalize `source`, relabeling the IDs recorded in `tracker`
    /// through `mapping`.
    pub fn new(source: JsonSource, tracker: IdReferenceTracker, mapping: IdMapping) -> Self {
        Self {
            source,
            tracker,
            mapping,
            metadata: None,
            relabeled: None,
            output: None,
            md5: None,
            destroyed: false,
        }
    }

    /// Ask `resolver` for replacements of the recorded IDs, then build the
    /// payload with them.
    pub fn resolve<R: IdResolver + ?Sized>(
        source: JsonSource,
        tracker: IdReferenceTracker,
        resolver: &R,
    ) -> Result<Self, ResolveError> {
        let mapping = resolver.resolve(tracker.references())?;
        Ok(Self::new(source, tracker, mapping))
    }

    /// Select object metadata for [`Self::extract_metadata`].
    pub fn with_metadata_selection(mut self, selection: MetadataSelection) -> Self {
        self.metadata = Some(selection);
        self
    }

    fn ensure_live(&self) -> Result<(), PayloadStateError> {
        if self.destroyed {
            Err(PayloadStateError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Size in bytes of the relabeled document. Computed once.
    pub fn calculate_relabeled_size(&mut self) -> Result<u64, PayloadError> {
        Ok(self.relabel_outcome()?.size)
    }

    fn relabel_outcome(&mut self) -> Result<RelabelOutcome, PayloadError> {
        self.ensure_live()?;
        if let Some(outcome) = self.relabeled {
            return Ok(outcome);
        }
        let outcome = relabel(
            self.source.open()?,
            &self.tracker,
            &self.mapping,
            std::io::sink(),
        )?;
        self.relabeled = Some(outcome);
        Ok(outcome)
    }

    /// The relabeled size; also the canonical size, since sorting only
    /// reorders bytes.
    pub fn relabeled_size(&self) -> Result<u64, PayloadStateError> {
        self.ensure_live()?;
        self.relabeled
            .map(|o| o.size)
            .ok_or(PayloadStateError::SizeNotCalculated)
    }

    /// Alias of [`Self::relabeled_size`].
    pub fn size(&self) -> Result<u64, PayloadStateError> {
        self.relabeled_size()
    }

    /// Whether relabeling produced already-sorted output.
    pub fn is_naturally_sorted(&self) -> Result<bool, PayloadStateError> {
        self.ensure_live()?;
        self.relabeled
            .map(|o| o.naturally_sorted)
            .ok_or(PayloadStateError::SizeNotCalculated)
    }

    /// Produce the canonical bytes and their MD5.
    ///
    /// `budget` bounds key memory (see [`crate::sorter`]). With
    /// `temp_files` the output is spooled to disk; otherwise it is kept in
    /// memory. Any previous output is released first, and every spool file
    /// created by a failed attempt is deleted before the error returns.
    pub fn sort(
        &mut self,
        budget: u64,
        temp_files: Option<&Arc<TempFilesManager>>,
    ) -> Result<(), PayloadError> {
        let outcome = self.relabel_outcome()?;
        self.release_cached_resources();
        let (backing, digest) = match temp_files {
            None => self.sort_in_memory(budget, outcome)?,
            Some(tfm) => self.sort_on_disk(budget, outcome, tfm)?,
        };
        tracing::debug!(
            size = outcome.size,
            naturally_sorted = outcome.naturally_sorted,
            on_disk = temp_files.is_some(),
            md5 = %digest,
            "payload sorted"
        );
        self.output = Some(backing);
        self.md5 = Some(digest);
        Ok(())
    }

    fn relabel_into<W: Write>(&self, out: W) -> Result<(), PayloadError> {
        relabel(self.source.open()?, &self.tracker, &self.mapping, out)?;
        Ok(())
    }

    fn sort_in_memory(
        &self,
        budget: u64,
        outcome: RelabelOutcome,
    ) -> Result<(Backing, Md5Digest), PayloadError> {
        let capacity = usize::try_from(outcome.size).unwrap_or(0);
        let hashing = HashingWriter::new(Vec::with_capacity(capacity));
        let hashing = if outcome.naturally_sorted {
            let mut hashing = hashing;
            self.relabel_into(&mut hashing)?;
            hashing
        } else {
            let mut input = Vec::with_capacity(capacity);
            self.relabel_into(&mut input)?;
            let limit = budget.saturating_sub(input.len() as u64);
            KeySorter::new(Cursor::new(input.as_slice()), limit).write_into(hashing)?
        };
        let (bytes, digest, _) = hashing.finish()?;
        Ok((Backing::Memory(bytes.into()), digest))
    }

    fn sort_on_disk(
        &self,
        budget: u64,
        outcome: RelabelOutcome,
        tfm: &Arc<TempFilesManager>,
    ) -> Result<(Backing, Md5Digest), PayloadError> {
        if outcome.naturally_sorted {
            let output = tfm.generate_temp_file("natsortout", "json")?;
            let mut hashing = HashingWriter::new(BufWriter::new(File::create(output.path())?));
            self.relabel_into(&mut hashing)?;
            let (_, digest, _) = hashing.finish()?;
            return Ok((Backing::Disk(output), digest));
        }

        let input = tfm.generate_temp_file("sortinp", "json")?;
        let mut spooled = BufWriter::new(File::create(input.path())?);
        self.relabel_into(&mut spooled)?;
        spooled.flush()?;
        drop(spooled);

        let output = tfm.generate_temp_file("sortout", "json")?;
        let hashing = HashingWriter::new(BufWriter::new(File::create(output.path())?));
        let hashing = KeySorter::new(File::open(input.path())?, budget).write_into(hashing)?;
        let (_, digest, _) = hashing.finish()?;
        Ok((Backing::Disk(output), digest))
    }

    /// MD5 of the canonical bytes.
    pub fn md5(&self) -> Result<Md5Digest, PayloadStateError> {
        self.ensure_live()?;
        self.md5.ok_or(PayloadStateError::Md5NotCalculated)
    }

    /// A fresh reader over the canonical bytes.
    pub fn reader(&self) -> Result<PayloadReader, PayloadError> {
        self.ensure_live()?;
        let output = self.output.as_ref().ok_or(PayloadStateError::NotSorted)?;
        Ok(output.reader()?)
    }

    /// Extract the selected object metadata, failing once names and values
    /// together exceed `max_size` bytes. Empty without a selection.
    pub fn extract_metadata(&self, max_size: u64) -> Result<ExtractedMetadata, PayloadError> {
        self.ensure_live()?;
        let selection = match &self.metadata {
            Some(selection) if !selection.is_empty() => selection,
            _ => return Ok(ExtractedMetadata::default()),
        };
        let metadata = match &self.output {
            Some(output) => extract_metadata(TokenStream::new(output.reader()?), selection, max_size)?,
            None => {
                let (relabeled, _) = relabel_to_vec(self.source.open()?, &self.tracker, &self.mapping)?;
                extract_metadata(TokenStream::new(relabeled.as_slice()), selection, max_size)?
            }
        };
        Ok(metadata)
    }

    /// Drop the sorted output and its spool file. The relabeled size is
    /// kept; `sort()` may be called again.
    pub fn release_cached_resources(&mut self) {
        self.output = None;
        self.md5 = None;
    }

    /// Release everything. Every later call except [`Self::is_destroyed`]
    /// fails.
    pub fn destroy(&mut self) {
        self.release_cached_resources();
        self.destroyed = true;
    }

    /// Whether [`Self::destroy`] was called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn plain(json: &str) -> CanonicalPayload {
        CanonicalPayload::new(JsonSource::from(json), IdReferenceTracker::new(), IdMapping::new())
    }

    fn read_all(payload: &CanonicalPayload) -> String {
        let mut out = String::new();
        payload.reader().unwrap().read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_state_errors_before_steps() {
        let mut payload = plain(r#"{"z":"a","b":"d"}"#);
        assert_eq!(payload.size(), Err(PayloadStateError::SizeNotCalculated));
        assert_eq!(payload.md5(), Err(PayloadStateError::Md5NotCalculated));
        assert_eq!(
            payload.reader().unwrap_err().to_string(),
            "You must call sort() prior to accessing the object data."
        );

        assert_eq!(payload.calculate_relabeled_size().unwrap(), 17);
        assert_eq!(payload.size(), Ok(17));
        assert_eq!(payload.is_naturally_sorted(), Ok(false));
        assert_eq!(
            payload.md5().unwrap_err().to_string(),
            "Must call sort() before getting the MD5"
        );
    }

    #[test]
    fn test_sort_in_memory() {
        let mut payload = plain(r#"{"z":"a","b":"d"}"#);
        payload.sort(1_000, None).unwrap();
        assert_eq!(payload.size(), Ok(17));
        assert_eq!(payload.md5().unwrap().to_hex(), "16903d0745c0f47a90d92d1abd535b12");
        assert_eq!(read_all(&payload), r#"{"b":"d","z":"a"}"#);
        // Readers are independent.
        assert_eq!(read_all(&payload), read_all(&payload));
    }

    #[test]
    fn test_naturally_sorted_skips_budget() {
        let mut payload = plain(r#"{"a": 1, "b": {"c": 2}}"#);
        payload.sort(0, None).unwrap();
        assert_eq!(payload.is_naturally_sorted(), Ok(true));
        assert_eq!(read_all(&payload), r#"{"a":1,"b":{"c":2}}"#);
    }

    #[test]
    fn test_metadata_before_and_after_sort() {
        let selection = MetadataSelection::new([("owner", "info.owner"), ("keys", "length(info)")]);
        let mut payload = CanonicalPayload::new(
            JsonSource::from(r#"{"info":{"owner":"old","z":1}}"#),
            IdReferenceTracker::new(),
            IdMapping::new(),
        )
        .with_metadata_selection(selection);

        let before = payload.extract_metadata(u64::MAX).unwrap();
        payload.sort(1_000, None).unwrap();
        let after = payload.extract_metadata(u64::MAX).unwrap();
        assert_eq!(before, after);
        assert_eq!(after.get("owner"), Some("old"));
        assert_eq!(after.get("keys"), Some("2"));

        let err = payload.extract_metadata(10).unwrap_err();
        assert!(matches!(
            err,
            PayloadError::Metadata(crate::error::MetadataError::ExceededMaxSize { limit: 10 })
        ));

        payload.destroy();
        assert!(matches!(
            payload.extract_metadata(u64::MAX),
            Err(PayloadError::State(PayloadStateError::Destroyed))
        ));
    }

    #[test]
    fn test_no_selection_means_no_metadata() {
        let payload = plain(r#"{"a":1}"#);
        assert!(payload.extract_metadata(0).unwrap().is_empty());
    }

    #[test]
    fn test_release_allows_resort() {
        let mut payload = plain(r#"{"z":"a","b":"d"}"#);
        payload.sort(1_000, None).unwrap();
        payload.release_cached_resources();
        assert_eq!(payload.md5(), Err(PayloadStateError::Md5NotCalculated));
        assert_eq!(payload.size(), Ok(17));
        payload.sort(1_000, None).unwrap();
        assert_eq!(read_all(&payload), r#"{"b":"d","z":"a"}"#);
    }

    #[test]
    fn test_destroy_is_terminal_and_idempotent() {
        let mut payload = plain(r#"{"z":"a"}"#);
        payload.sort(1_000, None).unwrap();
        payload.destroy();
        payload.destroy();
        assert!(payload.is_destroyed());
        assert_eq!(payload.md5(), Err(PayloadStateError::Destroyed));
        assert_eq!(payload.size(), Err(PayloadStateError::Destroyed));
        let err = payload.sort(1_000, None).unwrap_err();
        assert_eq!(err.to_string(), "This payload has been destroyed");
    }

    #[test]
    fn test_resolver_supplies_mapping() {
        let resolver = |_: &[typedobj_idref::IdReference]| -> Result<IdMapping, ResolveError> {
            Ok([("a", "b")].into_iter().collect())
        };
        let payload = CanonicalPayload::resolve(
            JsonSource::from("{}"),
            IdReferenceTracker::new(),
            &resolver,
        )
        .unwrap();
        assert!(!payload.mapping.is_empty());
    }
}
