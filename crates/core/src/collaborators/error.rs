//! Error type shared by collaborator traits.

use thiserror::Error;

/// Errors returned by external collaborators.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}
