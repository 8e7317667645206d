//! Error types for the Azure DevOps Boards MCP server.

use thiserror::Error;

/// Errors that can occur while serving a tool call.
#[derive(Debug, Error)]
pub enum Error {
    /// "My work items" was requested without a user.
    #[error("No user specified and no default user configured")]
    NoDefaultUser,

    /// Invalid argument value provided.
    #[error("Invalid {field}: '{value}'. Valid values: {valid_values}")]
    InvalidArgument {
        /// The field name that had an invalid value.
        field: &'static str,
        /// The invalid value that was provided.
        value: String,
        /// Description of valid values.
        valid_values: &'static str,
    },

    /// An error from the boards core.
    #[error(transparent)]
    Boards(#[from] azdo_boards::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MCP protocol error.
    #[error("MCP error: {0}")]
    Mcp(String),
}

impl Error {
    /// Whether the call was rejected before any remote request was made.
    #[must_use]
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::NoDefaultUser | Self::InvalidArgument { .. })
    }
}

/// Result type for MCP tool operations.
pub type Result<T> = std::result::Result<T, Error>;
