//! # Error Types — Sorting, Payload State, Extraction and Spool Files
//!
//! Two families are kept apart. [`PayloadStateError`] means the caller used
//! an object out of order (asked for an MD5 before sorting, touched a
//! destroyed cache). Everything else means the data or the environment was
//! bad. Callers are expected to treat the first as a bug and the second as
//! input they can report.

use std::path::PathBuf;

use thiserror::Error;
use typedobj_core::{DocumentPath, TokenError};
use typedobj_idref::RelabelError;

/// Fatal failure of a key-sorting pass.
#[derive(Error, Debug)]
pub enum SortError {
    /// Holding the keys of the object at `location` (plus those of every
    /// enclosing object) would exceed the sorter's memory limit.
    #[error("Memory necessary for sorting map keys exceeds the limit {limit} bytes at {location}")]
    TooManyKeys {
        /// The limit in bytes that was exceeded.
        limit: u64,
        /// Path of the object whose keys broke the limit.
        location: DocumentPath,
    },

    /// An object contains the same key twice.
    #[error("Duplicated key '{key}' was found at {location}")]
    DuplicateKey {
        /// The repeated key.
        key: String,
        /// Path of the containing object.
        location: DocumentPath,
    },

    /// Containers are nested deeper than the sorter will recurse.
    #[error("JSON nesting deeper than {limit} levels at {location}")]
    NestingTooDeep {
        /// The enforced limit.
        limit: usize,
        /// Path of the container that crossed it.
        location: DocumentPath,
    },

    /// The document could not be tokenized.
    #[error("failed to read document for sorting: {0}")]
    Token(#[from] TokenError),

    /// Reading or writing bytes failed.
    #[error("io error while sorting: {0}")]
    Io(#[from] std::io::Error),
}

/// An accessor was called before its prerequisite, or after destruction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStateError {
    /// Size requested before the relabeled size was calculated.
    #[error("Must call calculateRelabeledSize() before getting said size")]
    SizeNotCalculated,

    /// Digest requested before sorting.
    #[error("Must call sort() before getting the MD5")]
    Md5NotCalculated,

    /// Canonical bytes requested before sorting.
    #[error("You must call sort() prior to accessing the object data.")]
    NotSorted,

    /// A canonical payload was used after `destroy()`.
    #[error("This payload has been destroyed")]
    Destroyed,

    /// A cached payload was used after `destroy()`.
    #[error("This payload cache is destroyed")]
    CacheDestroyed,
}

/// Failure creating or managing spool files.
#[derive(Error, Debug)]
pub enum TempFileError {
    /// The spool directory could not be created.
    #[error("could not create temp directory '{path}': {source}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A spool file could not be created.
    #[error("could not create temp file '{path}': {source}")]
    CreateFile {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// A subset selection could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// No paths were given.
    #[error("paths cannot be empty")]
    EmptyPaths,

    /// A path used `~` other than in `~0` or `~1`.
    #[error("Wrong usage of ~ in json pointer path: {path} ({marked})")]
    BadPointerEscape {
        /// The offending path.
        path: String,
        /// The offending segment with the bad escape marked by `[->]`.
        marked: String,
    },

    /// A selected array position is past the end of the array.
    #[error("Invalid selection: no array element exists at position '{index}', at: {location}")]
    MissingElement {
        /// The requested position.
        index: usize,
        /// Path of the missing element.
        location: DocumentPath,
    },

    /// A selected field is absent and maps are strict.
    #[error("Invalid selection: data does not contain a field or key named '{key}', at: {location}")]
    MissingField {
        /// The requested field.
        key: String,
        /// Path of the missing field.
        location: DocumentPath,
    },

    /// The selection descends into a scalar.
    #[error("Invalid selection: the path given specifies fields or elements that do not exist because data at this location is a scalar value (i.e. string, integer, float), at: {location}")]
    ScalarHasChildren {
        /// Path of the scalar.
        location: DocumentPath,
    },

    /// An array was addressed with something other than a position.
    #[error("Invalid selection: data at '{location}' is an array, so element selection must be an integer.  You requested element '{element}', at: {location}")]
    NonIntegerElement {
        /// The requested element.
        element: String,
        /// Path of the array.
        location: DocumentPath,
    },

    /// A wildcard and a named field or position were selected together.
    #[error("Invalid selection: selection path contains both a wildcard and a specific field or element, at: {location}")]
    MixedWildcard {
        /// Path of the container.
        location: DocumentPath,
    },
}

/// Object metadata could not be extracted.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The selection is not an object of string expressions.
    #[error("invalid metadata selection: {0}")]
    InvalidSelection(String),

    /// The extracted names and values together exceed the size limit.
    #[error("Metadata generated from the object data exceeds the maximum allowed size of {limit}B")]
    ExceededMaxSize {
        /// The limit in bytes.
        limit: u64,
    },

    /// A selection descends into an array.
    #[error("Cannot extract metadata from an array. Requested fields are ({fields}) at {location}")]
    ArrayHasFields {
        /// The requested fields, rendered as `[a, b]`.
        fields: String,
        /// Path of the array.
        location: DocumentPath,
    },

    /// A selection descends into a scalar.
    #[error("WS metadata path contains non-empty level for scalar value at {location}")]
    ScalarHasFields {
        /// Path of the scalar.
        location: DocumentPath,
    },

    /// `length()` was applied to a number or boolean.
    #[error("Metadata path contains length() method called on a scalar value at {location}")]
    LengthOfScalar {
        /// Path of the scalar.
        location: DocumentPath,
    },

    /// The document ended or was out of shape where a value was expected.
    #[error("unexpected {found} while extracting metadata at {location}")]
    UnexpectedEvent {
        /// Kind of the event found.
        found: &'static str,
        /// Path where it was found.
        location: DocumentPath,
    },

    /// The document could not be tokenized.
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Failure of a payload operation.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// Out-of-order or post-destroy use.
    #[error(transparent)]
    State(#[from] PayloadStateError),

    /// Sorting failed.
    #[error(transparent)]
    Sort(#[from] SortError),

    /// Subset selection failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Metadata extraction failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The relabel pass failed.
    #[error(transparent)]
    Relabel(#[from] RelabelError),

    /// A spool file could not be created.
    #[error(transparent)]
    TempFile(#[from] TempFileError),

    /// The stored document could not be tokenized.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Stored bytes could not be decoded into the requested type.
    #[error("could not decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Reading or writing payload bytes failed.
    #[error("payload io error: {0}")]
    Io(#[from] std::io::Error),
}
