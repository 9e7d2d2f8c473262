//! Errors raised while collecting, resolving and relabeling ID references.

use thiserror::Error;
use typedobj_core::TokenError;

use crate::reference::IdReferenceType;

/// Failure while recording ID references.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// An ID type was empty or whitespace.
    #[error("type cannot be null or whitespace only")]
    BlankType,

    /// More unique IDs were found than the tracker allows.
    #[error("Maximum ID count of {0} exceeded")]
    TooManyIds(u64),
}

/// Failure reported by a caller-supplied [`crate::IdResolver`].
#[derive(Error, Debug)]
#[error("failed to resolve {id_type} ID '{id}': {reason}")]
pub struct ResolveError {
    /// Type of the ID that could not be resolved.
    pub id_type: IdReferenceType,
    /// The raw ID.
    pub id: String,
    /// Why resolution failed.
    pub reason: String,
}

/// Failure during a relabeling pass.
#[derive(Error, Debug)]
pub enum RelabelError {
    /// The source document could not be read.
    #[error("failed to read document: {0}")]
    Token(#[from] TokenError),

    /// The relabeled output could not be written.
    #[error("failed to write relabeled document: {0}")]
    Io(#[from] std::io::Error),
}
