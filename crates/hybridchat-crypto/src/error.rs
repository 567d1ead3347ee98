//! Error types for key management, hybrid encryption and fan-out.

use thiserror::Error;

/// Errors from cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Keypair generation failed (randomness source or algorithm unavailable)
    #[error("key generation failed: {reason}")]
    KeyGeneration {
        /// Underlying failure
        reason: String,
    },

    /// Encoded public key could not be decoded
    #[error("invalid key encoding: {reason}")]
    InvalidKeyEncoding {
        /// What was wrong with the encoding
        reason: String,
    },

    /// Plaintext exceeds the capacity of the selected mode
    #[error("message too large: {len} bytes, limit is {max}")]
    MessageTooLarge {
        /// Plaintext length in bytes
        len: usize,
        /// Maximum accepted length in bytes
        max: usize,
    },

    /// Authentication tag or padding check failed
    #[error("integrity check failed")]
    Integrity,

    /// Session key could not be wrapped under a recipient's public key
    #[error("session key wrap failed: {reason}")]
    Wrap {
        /// Reason for the failure
        reason: String,
    },

    /// Session key could not be unwrapped (wrong key or corrupted bundle)
    #[error("session key unwrap failed: {reason}")]
    Unwrap {
        /// Reason for the failure
        reason: String,
    },

    /// Payload could not be decoded into a ciphertext at all
    #[error("decryption failed: {reason}")]
    Decryption {
        /// Reason for the failure
        reason: String,
    },

    /// Some recipients were omitted from a fan-out
    #[error("encryption skipped {} recipient(s): {}", omitted.len(), omitted.join(", "))]
    EncryptionPartialFailure {
        /// Usernames without a bundle
        omitted: Vec<String>,
    },

    /// No recipient could be encrypted for
    #[error("encryption failed for all {attempted} recipient(s)")]
    EncryptionFailed {
        /// Number of recipients that were attempted
        attempted: usize,
    },

    /// Fan-out was invoked without recipients
    #[error("no recipients to encrypt for")]
    NoRecipients,
}

impl CryptoError {
    /// Returns true if the error means a send must be rejected.
    ///
    /// A partial fan-out still delivers to the remaining recipients; every
    /// other encryption-side error leaves nothing to transmit.
    pub fn rejects_send(&self) -> bool {
        !matches!(self, Self::EncryptionPartialFailure { .. })
    }
}
