//! # Error Types — Token Source and Configuration Failures
//!
//! Errors raised below the validator: malformed JSON, I/O failure while
//! reading a backing source, root-path positioning failures, and
//! configuration loading problems. All use `thiserror`.
//!
//! Every variant here is fatal for the pass that raised it. Recoverable
//! validation problems never surface as a `TokenError`; they are collected
//! as data in the validation report.

use thiserror::Error;

/// Failure while reading the JSON token sequence.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Reading the backing source failed.
    #[error("io error while reading JSON: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not well-formed JSON.
    #[error("malformed JSON at byte {offset}: {reason}")]
    Malformed {
        /// Byte offset of the offending input.
        offset: u64,
        /// What was wrong.
        reason: String,
    },

    /// The input ended in the middle of a value.
    #[error("unexpected end of JSON input at byte {offset}")]
    UnexpectedEnd {
        /// Byte offset where input ended.
        offset: u64,
    },

    /// A string contained bytes that are not valid UTF-8.
    #[error("invalid UTF-8 in JSON string at byte {offset}")]
    InvalidUtf8 {
        /// Byte offset of the invalid sequence.
        offset: u64,
    },

    /// Containers were nested past [`crate::stream::MAX_NESTING_DEPTH`].
    #[error("JSON nesting deeper than {limit} levels at byte {offset}")]
    NestingTooDeep {
        /// The enforced limit.
        limit: usize,
        /// Byte offset of the container that crossed it.
        offset: u64,
    },

    /// The stream diverged from the requested root path before reaching it.
    #[error("Root path not found: {0}")]
    RootNotFound(String),

    /// The stream ended before the requested root path was reached.
    #[error("End of token stream for root path: {0}")]
    RootNotReached(String),
}

impl TokenError {
    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}

/// Failure while loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`crate::EngineConfig`].
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Path of the configuration file.
        path: String,
        /// Underlying YAML error.
        source: serde_yaml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value '{value}' for environment variable {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}
