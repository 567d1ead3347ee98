//! Error types for the chat service.
//!
//! Every variant is reported to the requester as an error response; none of
//! them affect service state.

use thiserror::Error;

/// Errors that can occur while handling a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Username is empty or too long
    #[error("invalid username: {reason}")]
    InvalidUsername {
        /// What was wrong with the username
        reason: String,
    },

    /// Join request carried no public key
    #[error("missing public key for {username}")]
    MissingPublicKey {
        /// Username that tried to join
        username: String,
    },

    /// Message failed validation
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// What was wrong with the message
        reason: &'static str,
    },

    /// The log has assigned the largest representable timestamp
    #[error("message log timestamps exhausted")]
    TimestampsExhausted,

    /// Service configuration is unusable
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the configuration
        reason: &'static str,
    },
}
