//! # Hybridchat Protocol: Wire Format
//!
//! Payload types and framing for the Hybridchat message-distribution protocol.
//!
//! ## Protocol Design
//!
//! - **Framing**: a 4-byte big-endian length prefix followed by a JSON body,
//!   at most 1 MiB. One request and one response per QUIC stream.
//! - **Payloads**: JSON objects tagged by `"type"` (`join`, `message`, `poll`
//!   and their responses). Binary fields are base64 strings.
//!
//! ## Typed Content
//!
//! The wire form of a message mixes plaintext strings, per-recipient bundle
//! maps and legacy ciphertext strings in a single `content` field. Decoding
//! resolves that field into [`Content`] (or [`ProjectedContent`] on the read
//! path) immediately, and rejects shapes that disagree with the `encrypted`
//! flag.
//!
//! ## Security Properties
//!
//! - **Size Limits**: oversized frames are rejected from the prefix alone,
//!   before the body is read.
//! - **No Crypto**: this crate never decodes or inspects ciphertext.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bundle;
pub mod codec;
pub mod errors;
pub mod message;
pub mod request;

pub use bundle::{BundleWire, HybridBundle};
pub use codec::{ALPN_PROTOCOL, MAX_FRAME_SIZE};
pub use errors::{ProtocolError, Result};
pub use message::{Content, Message, ProjectedContent, ProjectedMessage};
pub use request::{Request, Response};
