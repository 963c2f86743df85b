//! Client error types for the request/reply and broadcast paths.

use thiserror::Error;

/// Chat client errors.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Request envelope could not be serialized.
    #[error("Encode error: {0}")]
    Encode(String),

    /// Reply or broadcast frame could not be parsed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Connection failure, timeout, or non-success HTTP status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Well-formed reply carrying a non-success status.
    #[error("Server rejected request ({status}): {description}")]
    Application { status: String, description: String },

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Configuration error: {0}")]
    Config(String),

    /// The listener or its control channel has gone away.
    #[error("Connection closed")]
    Closed,
}

impl ChatError {
    pub fn is_application(&self) -> bool {
        matches!(self, ChatError::Application { .. })
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChatError::Transport(format!("request timed out: {}", e))
        } else {
            ChatError::Transport(e.to_string())
        }
    }
}

impl From<crate::config::ConfigLoadError> for ChatError {
    fn from(e: crate::config::ConfigLoadError) -> Self {
        ChatError::Config(e.to_string())
    }
}

impl From<zeromq::ZmqError> for ChatError {
    fn from(e: zeromq::ZmqError) -> Self {
        ChatError::Transport(e.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
