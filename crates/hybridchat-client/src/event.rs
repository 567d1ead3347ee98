//! Client events and actions.

use std::time::Duration;

use hybridchat_proto::{Request, Response};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Delivering responses (or transport failures) for sent requests
/// - Driving time forward via ticks
/// - Forwarding application intents (join, send message)
///
/// Generic over `I` (Instant type) to support both production
/// (std::time::Instant) and simulation (tokio::time::Instant) environments.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Register our username and public key with the server.
    Join,

    /// Application wants to send a message to everyone present.
    SendMessage {
        /// Message text.
        text: String,
    },

    /// Time tick. Drives polling and join retries.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// Server answered a request.
    ResponseReceived(Response),

    /// A request could not be delivered.
    RequestFailed {
        /// The request that failed. Messages are retried after reconnect.
        request: Request,
        /// Transport error description.
        reason: String,
    },
}

/// Body of a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Readable text (plaintext or successfully decrypted).
    Text(String),

    /// Addressed to us but could not be decrypted.
    Undecryptable {
        /// Why decryption failed.
        reason: String,
    },

    /// Encrypted message with no bundle for us, typically sent before we
    /// joined.
    NotAddressed,
}

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message id.
    pub id: String,
    /// Sender username.
    pub sender: String,
    /// Message body.
    pub body: MessageBody,
    /// Whether the message travelled encrypted.
    pub encrypted: bool,
    /// Log timestamp (sender's clock for local echoes).
    pub timestamp: u64,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone)]
pub enum ClientAction {
    /// Send a request to the server and feed back the outcome as
    /// `ResponseReceived` or `RequestFailed`.
    Send(Request),

    /// Deliver a message to the application layer.
    DeliverMessage(ChatMessage),

    /// Set of present users changed.
    UsersChanged {
        /// Present usernames, sorted.
        users: Vec<String>,
    },

    /// Connectivity to the server changed.
    ConnectionChanged {
        /// Whether the last request reached the server.
        connected: bool,
    },

    /// User-facing notice (encryption warnings, server errors).
    Notice {
        /// Notice text.
        message: String,
        /// How long to show the notice.
        timeout: Duration,
    },

    /// Log message for debugging.
    Log {
        /// Log message.
        message: String,
    },
}
