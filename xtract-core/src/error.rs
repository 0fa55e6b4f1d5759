//! Error types for the xtract core library.
//!
//! Uses `thiserror` for public API error types. Errors split into two
//! families: [`LoadError`] is fatal and prevents the service from starting,
//! while [`QueryError`] is scoped to a single lookup or search and maps to an
//! HTTP status at the gateway boundary.

use std::path::PathBuf;

/// Top-level error type for the xtract core library.
#[derive(Debug, thiserror::Error)]
pub enum XtractError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while acquiring the corpus, vector index, or encoder.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV: {message}")]
    Csv { message: String },

    #[error("Corpus has no columns matching any of: {expected}")]
    MissingColumns { expected: String },

    #[error("Malformed embedding matrix {path}: {message}")]
    Matrix { path: PathBuf, message: String },

    #[error("Embedding matrix has {rows} rows but the corpus has {records} records")]
    RowCountMismatch { rows: usize, records: usize },

    #[error("Encoder unavailable: {message}")]
    Encoder { message: String },

    #[error("Failed to build vector index: {message}")]
    Index { message: String },
}

/// Per-request errors from lookup and search operations.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Paper not found: {id}")]
    NotFound { id: String },

    #[error("{reason}")]
    InvalidQuery { reason: String },

    #[error("{message}")]
    Internal { message: String },
}

impl QueryError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Errors from the text encoder collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("Encoder request failed: {message}")]
    Request { message: String },

    #[error("Encoder response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Encoder returned {got} dimensions, expected {expected}")]
    Dimensions { expected: usize, got: usize },
}

/// Errors from vector index queries.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Query vector has {got} dimensions but the index has {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Index row {row} has no corpus record")]
    DanglingRow { row: usize },
}

impl From<EncoderError> for QueryError {
    fn from(err: EncoderError) -> Self {
        QueryError::internal(err.to_string())
    }
}

impl From<IndexError> for QueryError {
    fn from(err: IndexError) -> Self {
        QueryError::internal(err.to_string())
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `XtractError`.
pub type Result<T> = std::result::Result<T, XtractError>;
