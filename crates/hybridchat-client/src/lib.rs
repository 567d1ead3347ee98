//! Client
//!
//! Action-based client state machine for Hybridchat. Owns the user's keypair,
//! encrypts outgoing messages for every present peer, and decrypts what the
//! server projects for us.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`hybridchat_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: State machine for one user's session
//! - [`bundle`]: Wire bundle encoding, including the legacy string form
//! - [`EnvRng`]: Environment randomness behind the `rand` traits
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::connect`]: Connect to a server
//! - [`transport::run_session`]: Drive a client over QUIC

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bundle;
mod client;
mod error;
mod event;
mod rng;

#[cfg(feature = "transport")]
pub mod transport;

pub use client::{
    Client, ClientConfig, DEFAULT_MAX_MESSAGE_CHARS, DEFAULT_NOTICE_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
pub use error::ClientError;
pub use event::{ChatMessage, ClientAction, ClientEvent, MessageBody};
pub use hybridchat_core::Environment;
pub use hybridchat_crypto::{EncodedPublicKey, KeyPair};
pub use rng::EnvRng;
