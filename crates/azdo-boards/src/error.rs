//! Error types for Azure DevOps Boards operations.

use thiserror::Error;

/// The error type for boards operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested work item does not exist.
    #[error("Work item {0} not found")]
    NotFound(u32),

    /// The work item exists but has an unexpected type.
    #[error("Work item {id} is not an {expected} (type: {actual})")]
    TypeMismatch {
        /// Identifier of the offending work item.
        id: u32,
        /// The type the caller required.
        expected: &'static str,
        /// The type the service reported.
        actual: String,
    },

    /// Azure DevOps answered with a non-2xx status.
    #[error("Azure DevOps returned {status} for {url}: {body}")]
    RemoteService {
        /// HTTP status code.
        status: u16,
        /// The request URL, without query parameters.
        url: String,
        /// Response body text.
        body: String,
    },

    /// Some sub-requests of a fan-out failed; the surviving results were kept.
    #[error("{failed} of {total} sub-requests failed; results are partial")]
    PartialBatchFailure {
        /// Number of failed sub-requests.
        failed: usize,
        /// Number of sub-requests issued.
        total: usize,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided by any source.
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    /// A setting was present but could not be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Setting name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A configuration file could not be read or parsed.
    #[error("Failed to load {path}: {reason}")]
    File {
        /// Path of the file.
        path: String,
        /// What went wrong.
        reason: String,
    },
}

/// A specialized Result type for boards operations.
pub type Result<T> = std::result::Result<T, Error>;
