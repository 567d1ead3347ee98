//! Hybridchat Cryptographic Primitives
//!
//! Key management, hybrid encryption and recipient fan-out for Hybridchat.
//! Pure functions; callers provide the RNG so every operation is
//! deterministic under test.
//!
//! # Key Lifecycle
//!
//! Every client generates one RSA keypair per session and publishes the public
//! half. For each outgoing message a fresh AES-256 session key encrypts the
//! body once, and the session key alone is wrapped for every recipient.
//!
//! ```text
//! KeyPair (RSA-2048, per session)
//!        │
//!        ▼
//! export_public → base64(SPKI DER) → presence registry
//!
//! Session Key (32 random bytes, per message)
//!        │
//!        ├──► AES-256-GCM(plaintext, nonce) → shared ciphertext
//!        │
//!        └──► RSA-OAEP-SHA256(session key) → one wrapped key per recipient
//! ```
//!
//! Session keys are zeroized after the send and never persisted.
//!
//! # Security
//!
//! Confidentiality:
//! - A recipient can only unwrap the session key wrapped under its own key
//! - Bundles for other recipients never reach a reader (server projection)
//!
//! Authenticity:
//! - AES-GCM tag failure -> `Integrity`, no partial plaintext
//! - OAEP padding failure -> `Unwrap` (hybrid) or `Integrity` (direct)
//!
//! Not provided:
//! - Public key authentication (a relay can substitute keys)
//! - Forward secrecy beyond per-message session keys

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod error;
pub mod fanout;
pub mod keys;

pub use cipher::{
    CipherBundle, DIRECT_MAX_PLAINTEXT, NONCE_SIZE, Nonce, SESSION_KEY_SIZE, SessionKey, TAG_SIZE,
    decrypt, encrypt_hybrid, open, seal,
};
pub use error::CryptoError;
pub use fanout::{Fanout, decrypt_own, encrypt_for_recipients};
pub use keys::{EncodedPublicKey, KeyPair, MODULUS_BITS, PublicKey};
