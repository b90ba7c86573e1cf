use thiserror::Error;

use crate::profile::ProfileError;

/// Every failure the chat client can surface to the user. None of these are
/// fatal: the shell shows the message and returns to idle.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{operation} failed: {reason}")]
    RequestFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("Chat {0} not found")]
    NotFound(i64),

    #[error("{0}")]
    StreamError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("Profile storage error: {0}")]
    Storage(#[from] ProfileError),
}

impl ChatError {
    pub fn request_failed(operation: &'static str, reason: impl ToString) -> Self {
        ChatError::RequestFailed {
            operation,
            reason: reason.to_string(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        ChatError::ValidationFailed(reason.into())
    }
}
