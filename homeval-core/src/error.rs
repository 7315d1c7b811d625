//! Error types for the homeval core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering form validation, the prediction service, persistence, export,
//! and configuration.

use std::path::PathBuf;

/// Top-level error type for the homeval core library.
#[derive(Debug, thiserror::Error)]
pub enum HomevalError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Prediction service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Bad form input. Always user-correctable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Field '{field}' is not a valid number: '{value}'")]
    NotANumber { field: String, value: String },

    #[error("Field '{field}' must not be negative")]
    Negative { field: String },

    #[error("Unknown location code: {code}")]
    UnknownLocation { code: i64 },
}

/// Failures of the external prediction call. Retryable by resubmitting.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Prediction request failed: {message}")]
    Request { message: String },

    #[error("Prediction service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected prediction response: {message}")]
    ResponseParse { message: String },

    #[error("Prediction request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Prediction service unavailable: {message}")]
    Unavailable { message: String },
}

/// Storage read/write failures. Non-fatal: the session degrades to
/// in-memory only.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Storage quota exceeded: {needed} bytes requested, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("Failed to read '{key}': {message}")]
    Read { key: String, message: String },

    #[error("Failed to write '{key}': {message}")]
    Write { key: String, message: String },

    #[error("Stored snapshot '{key}' is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

/// Nothing to export, or the export file could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No current prediction to export")]
    NoCurrentRecord,

    #[error("No history to export")]
    EmptyHistory,

    #[error("Failed to write export file {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },

    #[error("Failed to encode export: {message}")]
    Encode { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Invalid {
            message: err.to_string(),
        }
    }
}

/// A type alias for results using the top-level `HomevalError`.
pub type Result<T> = std::result::Result<T, HomevalError>;
