//! Client error types.

use hybridchat_crypto::CryptoError;
use thiserror::Error;

/// Errors returned by [`Client::handle`](crate::Client::handle).
///
/// An error means the event was rejected and nothing was transmitted; the
/// client state is unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Message exceeds the configured character limit
    #[error("message too long: {len} characters, limit is {max}")]
    MessageTooLong {
        /// Message length in characters
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Operation requires a completed join
    #[error("not joined")]
    NotJoined,

    /// Encryption failed for every recipient; the send was rejected
    #[error("encryption error: {0}")]
    Crypto(#[from] CryptoError),
}
