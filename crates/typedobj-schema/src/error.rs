//! Errors raised while compiling schemas, resolving types and validating.
//!
//! Validation *findings* are not errors: they are accumulated as data in
//! [`crate::ValidationReport`]. The types here cover schema documents that
//! cannot be compiled and failures that abort a validation pass outright.

use std::path::PathBuf;

use thiserror::Error;
use typedobj_core::TokenError;
use typedobj_idref::IdError;

use crate::typedef::TypeDefId;

/// A schema document could not be compiled into a [`crate::SchemaNode`].
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The document is not JSON.
    #[error("Could not parse type schema document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A schema node was not a JSON object.
    #[error("schema node at {location} must be a JSON object")]
    NotAnObject {
        /// Location of the node inside the schema document.
        location: String,
    },

    /// `type` is missing or names an unsupported kind.
    #[error("Unsupported node type: {found} at {location}")]
    UnsupportedType {
        /// The `type` value found, or `null`.
        found: String,
        /// Location of the node inside the schema document.
        location: String,
    },

    /// `id-reference` does not name an ID type.
    #[error("ID reference in type schema is missing type")]
    MissingIdType,

    /// Both the legacy and current attribute lists were given.
    #[error("ID reference in type schema with valid-typedef-names and attributes both set is illegal")]
    ConflictingAttributes,

    /// The declared ID type is blank.
    #[error("invalid ID reference type: {0}")]
    IdType(#[from] IdError),

    /// A keyword has a value of the wrong shape.
    #[error("invalid value for '{field}' at {location}: {reason}")]
    InvalidField {
        /// The offending keyword.
        field: &'static str,
        /// Location of the node inside the schema document.
        location: String,
        /// What was wrong.
        reason: String,
    },
}

/// A failure that aborts a validation pass.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The instance is not well-formed JSON or could not be read.
    #[error("{0}")]
    Token(#[from] TokenError),

    /// More unique IDs were found than allowed.
    #[error("{0}")]
    Ids(#[from] IdError),

    /// The token source produced an event the grammar does not allow here.
    #[error("{expected} is expected but found {found}, at {location}")]
    UnexpectedEvent {
        /// What the validator was waiting for.
        expected: &'static str,
        /// Kind of event actually received.
        found: &'static str,
        /// Where it happened.
        location: String,
    },

    /// The requested type could not be resolved to a schema.
    #[error("{0}")]
    Type(#[from] RegistryError),
}

/// Failure while loading or querying schemas.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A schema file or directory could not be read.
    #[error("failed to read schema '{path}': {source}")]
    Io {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A schema file could not be compiled.
    #[error("failed to compile schema '{path}': {source}")]
    Schema {
        /// File being compiled.
        path: PathBuf,
        /// Underlying error.
        source: SchemaError,
    },

    /// No schema is registered for the type.
    #[error("Unable to locate type: {0}")]
    UnknownType(TypeDefId),

    /// A type identifier string is malformed.
    #[error("invalid type id '{0}': expected Module.Type[-major[.minor]]")]
    InvalidTypeDefId(String),
}
