#![deny(missing_docs)]

//! # typedobj-schema — Streaming Typed-Object Validation
//!
//! Compiles type schema documents into [`SchemaNode`] trees and validates
//! JSON instances against them in a single streaming pass.
//!
//! ## Validation (`validator`)
//!
//! [`Validator`] walks a [`typedobj_core::TokenSource`] and a schema in
//! lock-step. It produces a [`ValidationReport`] holding at most
//! [`MAX_ERROR_COUNT`] error messages, every ID reference occurrence with
//! its exact location, and the searchable subset and `metadata-ws`
//! annotations met along the way. Instances of any size can be validated
//! because nothing is buffered beyond the current path.
//!
//! ## Types (`registry`)
//!
//! [`TypeProvider`] is the boundary to whatever owns type definitions.
//! [`SchemaRegistry`] loads `*.schema.json` files from a directory;
//! [`TypedObjectValidator`] validates by [`TypeDefId`].
//!
//! ## Crate Policy
//!
//! - Depends only on `typedobj-core` and `typedobj-idref` internally.
//! - Error message texts are stable; callers match on them.
//! - Validation findings are data, never `Err`. Only malformed input, I/O
//!   failure, an unknown type or the unique-ID limit abort a pass.

pub mod error;
pub mod node;
pub mod registry;
pub mod report;
pub mod typedef;
pub mod validator;

pub use error::{RegistryError, SchemaError, ValidationError};
pub use node::{
    AdditionalPolicy, ArrayItemPolicy, ArrayNode, FieldRule, NodeMeta, NumericRange, ObjectNode,
    RangeBound, ReferenceSpec, ScalarKind, ScalarNode, SchemaNode,
};
pub use registry::{SchemaRegistry, TypeProvider, TypedObjectValidator};
pub use report::{MetadataSelectionAnnotation, SearchableSubset, ValidationReport, MAX_ERROR_COUNT};
pub use typedef::TypeDefId;
pub use validator::{validate, ValidationObserver, Validator};
