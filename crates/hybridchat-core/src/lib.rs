//! Hybridchat core: Sans-IO server state.
//!
//! - [`registry`]: who is present and which public key to encrypt for
//! - [`message_log`]: bounded, monotonically timestamped message history
//! - [`service`]: both of the above behind one request handler
//! - [`env`]: time and randomness abstraction shared with clients and the
//!   simulation harness
//!
//! Nothing here touches ciphertext. The server stores bundles verbatim and
//! only decides which one a reader may see.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod message_log;
pub mod registry;
pub mod service;

pub use env::Environment;
pub use error::ServiceError;
pub use message_log::{AppendOutcome, MessageLog, Page};
pub use registry::{PresenceRegistry, PublicKeyRecord};
pub use service::{ChatService, ServiceConfig};
