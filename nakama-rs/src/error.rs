//! Error types for the Nakama client.

use thiserror::Error;

use crate::rt::RtError;

/// Result type for Nakama operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Nakama client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("Server error: {message}")]
    Server { message: String, code: Option<i32> },

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Session expired.
    #[error("Session expired")]
    SessionExpired,

    /// Session token could not be decoded.
    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Realtime request failed.
    #[error("Realtime error: {0}")]
    Realtime(#[from] RtError),
}

impl Error {
    /// Create a server error from a message.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
            code: None,
        }
    }

    /// Create a server error with a code.
    pub fn server_with_code(message: impl Into<String>, code: i32) -> Self {
        Self::Server {
            message: message.into(),
            code: Some(code),
        }
    }

    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken(reason.into())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidUrl(e.to_string())
    }
}
