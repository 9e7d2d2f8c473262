#![deny(missing_docs)]

//! # typedobj-idref — ID Reference Tracking and Relabeling
//!
//! Typed objects embed references to other objects as plain strings, in
//! values or in mapping keys. The validator reports every such occurrence to
//! an [`IdReferenceTracker`]; after the caller's [`IdResolver`] maps raw IDs
//! to canonical ones, [`relabel`] rewrites the document in a second
//! streaming pass.
//!
//! ## Crate Policy
//!
//! - Relabeling only ever replaces string content at recorded locations.
//!   Structure, numbers and unrecorded strings pass through unchanged.
//! - The original document is never mutated; relabeling writes a new copy.
//! - ID resolution is always delegated to the caller.

pub mod error;
pub mod mapping;
pub mod reference;
pub mod relabel;
pub mod tracker;

pub use error::{IdError, RelabelError, ResolveError};
pub use mapping::{IdMapping, IdResolver};
pub use reference::{IdReference, IdReferenceType};
pub use relabel::{relabel, relabel_to_vec, RelabelOutcome};
pub use tracker::IdReferenceTracker;
