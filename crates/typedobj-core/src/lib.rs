#![deny(missing_docs)]

//! # typedobj-core — Streaming JSON Primitives for Typed Objects
//!
//! The leaf crate of the typed-object engine. It provides the pieces every
//! other crate builds on: a path-tracking token stream, the compact writer
//! that produces every byte the engine hashes, MD5 content digests, and the
//! engine configuration.
//!
//! ## Key Design Principles
//!
//! 1. **Never materialize the document.** Validation, relabeling and
//!    sorting all run over [`TokenStream`] events. No `serde_json::Value`
//!    tree is ever built for instance data.
//!
//! 2. **Exclusive cursors.** A [`TokenStream`] is obtained only by opening a
//!    [`JsonSource`], and each open yields an independent cursor. A stream
//!    cannot be cloned or shared between two operations.
//!
//! 3. **One encoder.** [`JsonWriter`] is the only way bytes are emitted, so
//!    sizes computed during relabeling match the bytes later hashed.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `typedobj-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod digest;
pub mod error;
pub mod lexer;
pub mod path;
pub mod source;
pub mod stream;
pub mod writer;

// Re-export primary types for ergonomic imports.
pub use config::EngineConfig;
pub use digest::{HashingWriter, Md5Digest};
pub use error::{ConfigError, TokenError};
pub use lexer::{ByteSource, Lexer, Token};
pub use path::{DocumentPath, PathSegment};
pub use source::{JsonSource, SourceReader};
pub use stream::{JsonEvent, ScalarValue, TokenSource, TokenStream, MAX_NESTING_DEPTH};
pub use writer::JsonWriter;
