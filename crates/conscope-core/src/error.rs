//! Session error types
//!
//! Every `Session::call` resolves to a value or to exactly one of these
//! kinds. The receive loop, router and sinks log their own failures instead
//! of returning them.

use std::time::Duration;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced to callers of the session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The channel could not be opened, or dropped while in use
    #[error("connection error: {detail}")]
    Connection { detail: String },

    /// No matching response arrived within the deadline
    #[error("'{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// Malformed message, remote error response, or failed evaluation
    #[error("protocol error: {detail}")]
    Protocol { detail: String },

    /// The session closed while the call was outstanding
    #[error("session closed while the call was pending")]
    Cancelled,
}

impl SessionError {
    pub(crate) fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol {
            detail: detail.into(),
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        Self::Connection {
            detail: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(format!("serialization failed: {err}"))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_maps_to_connection() {
        let err: SessionError = TransportError::Closed.into();
        assert!(matches!(err, SessionError::Connection { .. }));
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_timeout_display() {
        let err = SessionError::Timeout {
            method: "Runtime.evaluate".to_string(),
            duration: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "'Runtime.evaluate' timed out after 250ms");
    }
}
