#![deny(missing_docs)]

//! # typedobj-store — Canonical Payloads and Spool Storage
//!
//! Everything that holds typed-object bytes after validation.
//!
//! ## Canonical form (`sorter`, `payload`)
//!
//! [`CanonicalPayload`] relabels a document, sorts every object's keys by
//! UTF-8 byte order under a key-memory budget with [`KeySorter`], and
//! hashes the result with MD5 as it is written. Output goes to memory or to
//! a spool file, as the caller chooses.
//!
//! ## Object metadata (`metadata`)
//!
//! [`MetadataSelection`] compiles a type's `metadata-ws` annotation and
//! [`CanonicalPayload::extract_metadata`] applies it under a size limit.
//!
//! ## Cached payloads (`cache`, `subdata`)
//!
//! [`PayloadManager`] stores documents verbatim as [`CachedPayload`]s and
//! derives subsets from them, either by [`SubsetSelection`] or by a single
//! root path.
//!
//! ## Spool files (`tempfiles`, `fault`)
//!
//! [`TempFilesManager`] creates and tracks spool files and notifies
//! listeners of each one. Files are deleted when their [`SpoolGuard`] drops,
//! so failed operations never leak them. [`FaultHook`] lets tests fail an
//! operation midway.
//!
//! ## Crate Policy
//!
//! - Memory vs. disk is always an explicit caller choice, never decided by
//!   document size.
//! - Usage errors ([`PayloadStateError`]) are never mixed with data errors.
//! - No `unsafe` code.

mod backing;
pub mod cache;
pub mod error;
pub mod fault;
pub mod metadata;
pub mod payload;
pub mod sorter;
pub mod subdata;
pub mod tempfiles;

pub use backing::PayloadReader;
pub use cache::{CachedPayload, PayloadManager};
pub use error::{
    ExtractionError, MetadataError, PayloadError, PayloadStateError, SortError, TempFileError,
};
pub use fault::{FaultHook, FaultPoint};
pub use metadata::{extract_metadata, ExtractedMetadata, MetadataSelection};
pub use payload::CanonicalPayload;
pub use sorter::{sort_to_vec, KeySorter, SeekBytes, KEY_ENTRY_OVERHEAD};
pub use subdata::{extract, parse_pointer, SubsetSelection};
pub use tempfiles::{ListenerId, SpoolGuard, TempFileListener, TempFilesManager};
