//! Normalized error type for the portal API client.
//!
//! # Design
//! Every failure path of a call ends in one `ApiError`. Server-returned
//! errors carry the HTTP status and whatever `code`/`message`/`details` the
//! body provided. Failures that never produced a response (timeout, caller
//! abort, transport failure) have no status, which is how callers tell them
//! apart. The client never retries; `should_retry` is only a signal.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Code used when a non-2xx body does not supply one.
pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";

/// A non-2xx response, normalized.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("HTTP {http_status}: {message} ({code})")]
pub struct ServerError {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
    pub http_status: u16,
    /// Set when a 401 triggered a token refresh that produced a new token.
    pub should_retry: bool,
}

/// Errors returned by `ApiClient` calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("{0}")]
    Server(ServerError),

    /// No response arrived before the timeout elapsed.
    #[error("request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// The caller's cancellation token fired.
    #[error("request aborted")]
    Aborted,

    /// The request never reached a server.
    #[error("network error: {0}")]
    Transport(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A 2xx body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ApiError {
    pub fn code(&self) -> &str {
        match self {
            ApiError::Server(e) => &e.code,
            ApiError::Timeout { .. } => "TIMEOUT",
            ApiError::Aborted => "ABORTED",
            ApiError::Transport(_) => "NETWORK_ERROR",
            ApiError::Serialization(_) => "SERIALIZATION_ERROR",
            ApiError::Deserialization(_) => "PARSE_ERROR",
        }
    }

    /// Human-readable message; for server errors, the body's `message`.
    pub fn message(&self) -> String {
        match self {
            ApiError::Server(e) => e.message.clone(),
            other => other.to_string(),
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            ApiError::Server(e) => e.details.as_ref(),
            _ => None,
        }
    }

    /// `None` for every failure that did not come from a server response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ApiError::Server(e) => Some(e.http_status),
            _ => None,
        }
    }

    pub fn should_retry(&self) -> bool {
        matches!(self, ApiError::Server(e) if e.should_retry)
    }

    /// True for timeouts and caller aborts.
    pub fn is_abort(&self) -> bool {
        matches!(self, ApiError::Timeout { .. } | ApiError::Aborted)
    }
}

impl From<ServerError> for ApiError {
    fn from(e: ServerError) -> Self {
        ApiError::Server(e)
    }
}
