//! # Client Errors
//!
//! A single error type shared by every component of the crate. Public entry
//! points of the api client never return it directly: it is flattened into the
//! `error` string of an [`ApiResponse`](crate::retrieve::api_client::ApiResponse).

use thiserror::Error;

/// Message surfaced when a refresh attempt fails and the session is dropped.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Errors that can occur while talking to the leaderboard backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Network unreachable, DNS, TLS, timeouts, or a broken body stream.
    #[error("{0}")]
    Transport(String),

    /// The refresh token was rejected; the session has been cleared.
    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionExpired,

    /// Non-2xx response with the best message we could extract.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The persisted session could not be read or written.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Missing or invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request could not be built (bad URL, bad header, unserialisable body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::SessionExpired => Some(401),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for ClientError {
    fn from(e: reqwest_middleware::Error) -> Self {
        match e {
            reqwest_middleware::Error::Reqwest(inner) => inner.into(),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expired_renders_fixed_message() {
        assert_eq!(ClientError::SessionExpired.to_string(), SESSION_EXPIRED_MESSAGE);
        assert_eq!(ClientError::SessionExpired.status(), Some(401));
    }

    #[test]
    fn http_error_renders_message_only() {
        let err = ClientError::Http {
            status: 404,
            message: "not here".into(),
        };
        assert_eq!(err.to_string(), "not here");
        assert_eq!(err.status(), Some(404));
    }
}
