//! Server error types.

use std::fmt;

use hybridchat_core::ServiceError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing TLS certs, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (connection failure, I/O error, etc.).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    /// Check error message for details.
    Transport(String),

    /// Protocol error (oversized frame, undecodable JSON, etc.).
    ///
    /// Indicates a client sent malformed data. Fatal for that stream, but the
    /// server keeps serving the connection and other clients.
    Protocol(String),

    /// Internal error (unexpected state, logic bug, etc.).
    ///
    /// Should never happen in correct implementation. Indicates a bug.
    /// Fatal - report as issue.
    Internal(String),

    /// Chat service could not be constructed.
    ///
    /// Wraps configuration errors from the core service. See `ServiceError`
    /// for details.
    Service(ServiceError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Service(err) => write!(f, "service error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Service(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ServiceError> for ServerError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<hybridchat_proto::ProtocolError> for ServerError {
    fn from(err: hybridchat_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Config("missing key".to_string());
        assert_eq!(err.to_string(), "configuration error: missing key");

        let err = ServerError::from(ServiceError::InvalidConfig {
            reason: "log capacity must be at least 1",
        });
        assert_eq!(
            err.to_string(),
            "service error: invalid configuration: log capacity must be at least 1"
        );
    }

    #[test]
    fn protocol_error_converts() {
        let err = ServerError::from(hybridchat_proto::ProtocolError::JsonDecode("eof".into()));
        assert!(matches!(err, ServerError::Protocol(_)));
    }
}
