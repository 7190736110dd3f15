//! Error types for proxima operations.
//!
//! Every failure is reported synchronously at the point of the offending
//! call; nothing is logged-and-ignored. Construction-time errors never leave
//! a partially-usable index behind.

use std::io;
use thiserror::Error;

/// Result type alias using [`ProximaError`].
pub type Result<T> = std::result::Result<T, ProximaError>;

/// Errors that can occur during proxima operations.
#[derive(Error, Debug)]
pub enum ProximaError {
    /// A dataset record could not be parsed.
    #[error("parse error at record {record}: {reason}")]
    Parse {
        /// 1-based record (line) number of the offending input.
        record: usize,
        /// What went wrong with the record.
        reason: String,
    },

    /// Fewer usable records than the operation requires.
    #[error("insufficient data: required {required} objects, got {actual}")]
    InsufficientData {
        /// Minimum number of objects required.
        required: usize,
        /// Actual number of objects provided.
        actual: usize,
    },

    /// A parameter token is not of the `key=value` form.
    #[error("malformed parameter: {0}")]
    MalformedParam(String),

    /// A required parameter key is absent.
    #[error("missing parameter: {0}")]
    MissingParam(String),

    /// A parameter value could not be parsed as the requested type.
    #[error("type mismatch for parameter '{key}': expected {expected}, got '{value}'")]
    TypeMismatch {
        /// Parameter key.
        key: String,
        /// Expected type name.
        expected: &'static str,
        /// The unparsable value.
        value: String,
    },

    /// A parameter key is not recognized by the target method.
    #[error("unsupported parameter '{key}' for method '{method}'")]
    UnsupportedParam {
        /// Method name that rejected the key.
        method: String,
        /// The unrecognized key.
        key: String,
    },

    /// A build-time-only parameter was resupplied at query time.
    #[error("parameter '{key}' of method '{method}' is build-time only")]
    ImmutableParam {
        /// Method name that rejected the key.
        method: String,
        /// The build-time key.
        key: String,
    },

    /// A method name is already registered.
    #[error("method already registered: {0}")]
    DuplicateMethod(String),

    /// A method name is not registered.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A malformed query or construction argument (K < 1, negative radius, ...).
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The index does not implement the requested query variant.
    #[error("method '{method}' does not support {query_type} queries")]
    UnsupportedQueryType {
        /// Method name of the rejecting index.
        method: String,
        /// Query variant name ("knn" or "range").
        query_type: &'static str,
    },

    /// I/O error while reading an external dataset source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProximaError {
    /// Creates a new `Parse` error.
    pub fn parse(record: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            record,
            reason: reason.into(),
        }
    }

    /// Creates a new `InsufficientData` error.
    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    /// Creates a new `InvalidParam` error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParam(msg.into())
    }

    /// Creates a new `UnsupportedParam` error.
    pub fn unsupported_param(method: impl Into<String>, key: impl Into<String>) -> Self {
        Self::UnsupportedParam {
            method: method.into(),
            key: key.into(),
        }
    }

    /// Creates a new `ImmutableParam` error.
    pub fn immutable_param(method: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ImmutableParam {
            method: method.into(),
            key: key.into(),
        }
    }

    /// Creates a new `UnsupportedQueryType` error.
    pub fn unsupported_query(method: impl Into<String>, query_type: &'static str) -> Self {
        Self::UnsupportedQueryType {
            method: method.into(),
            query_type,
        }
    }
}
