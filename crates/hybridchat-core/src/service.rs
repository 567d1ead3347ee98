//! Chat service.
//!
//! Ties the presence registry and the message log together behind a single
//! request entry point. The service does no I/O; a runtime decodes requests,
//! calls [`ChatService::handle`] and writes the response back.
//!
//! One mutex guards both components, so every request is one critical
//! section: append-then-truncate and evict-then-read are never interleaved
//! with another request.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]
#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use hybridchat_proto::{
    Content, MAX_FRAME_SIZE, Message, ProjectedMessage, Request, Response, codec,
};

use crate::{
    env::Environment,
    error::ServiceError,
    message_log::{AppendOutcome, DEFAULT_CAPACITY, MessageLog},
    registry::{DEFAULT_PRESENCE_TTL, PresenceRegistry},
};

/// Default maximum username length in characters.
pub const DEFAULT_MAX_USERNAME_LEN: usize = 64;

/// Default byte budget for the messages of one poll response. The other half
/// of a frame is left for the user list and public keys.
pub const DEFAULT_MAX_BATCH_BYTES: usize = MAX_FRAME_SIZE / 2;

/// How far into the future a sender timestamp may point before it is clamped
/// to the server clock. Keeps one bad clock from pinning the log's
/// timestamps near `u64::MAX`.
pub const MAX_FUTURE_SKEW: Duration = Duration::from_secs(60);

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Number of retained messages (at least 1)
    pub capacity: usize,
    /// Users silent for longer than this are evicted
    pub presence_ttl: Duration,
    /// Maximum username length in characters
    pub max_username_len: usize,
    /// Encoded size of the messages in one poll response. Polls past it are
    /// paged, and messages whose delivered form exceeds it are refused.
    pub max_batch_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            presence_ttl: DEFAULT_PRESENCE_TTL,
            max_username_len: DEFAULT_MAX_USERNAME_LEN,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
        }
    }
}

struct State<I> {
    presence: PresenceRegistry<I>,
    log: MessageLog,
}

/// Presence registry and message log behind one request handler.
///
/// Thread-safe via Arc<Mutex<_>>. Clone shares the same underlying state.
#[derive(Clone)]
pub struct ChatService<E: Environment> {
    env: E,
    config: ServiceConfig,
    state: Arc<Mutex<State<E::Instant>>>,
}

impl<E: Environment> ChatService<E> {
    /// Create a service with an empty log and no users.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the log capacity or batch budget is zero
    pub fn new(env: E, config: ServiceConfig) -> Result<Self, ServiceError> {
        if config.max_batch_bytes == 0 {
            return Err(ServiceError::InvalidConfig { reason: "batch budget must be at least 1" });
        }
        let log = MessageLog::with_capacity(config.capacity)?;
        let state = State { presence: PresenceRegistry::new(), log };

        Ok(Self { env, config, state: Arc::new(Mutex::new(state)) })
    }

    /// Service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Handle one request. Failures become [`Response::Error`]; state is
    /// never left half-updated.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn handle(&self, request: Request) -> Response {
        let kind = request.kind();
        let result = match request {
            Request::Join { username, public_key } => self.join(&username, &public_key),
            Request::Message(message) => self.append(message),
            Request::Poll { since, username } => Ok(self.poll(since, &username)),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!("Rejected {} request: {}", kind, e);
            Response::Error { message: e.to_string() }
        })
    }

    fn join(&self, username: &str, public_key: &str) -> Result<Response, ServiceError> {
        self.validate_username(username)?;
        if public_key.trim().is_empty() {
            return Err(ServiceError::MissingPublicKey { username: username.to_string() });
        }

        let now = self.env.now();
        let mut state = self.state.lock().expect("ChatService mutex poisoned");

        state.presence.join(username, public_key, now);
        self.evict(&mut state, now);

        tracing::info!("{} joined ({} active)", username, state.presence.len());

        Ok(Response::Joined {
            users: state.presence.active_usernames(),
            public_keys: state.presence.all_public_keys_except(username),
            cursor: state.log.latest_timestamp(),
        })
    }

    fn append(&self, mut message: Message) -> Result<Response, ServiceError> {
        if message.id.is_empty() {
            return Err(ServiceError::InvalidMessage { reason: "message id is empty" });
        }
        if message.sender.is_empty() {
            return Err(ServiceError::InvalidMessage { reason: "sender is empty" });
        }
        if largest_projection(&message) > self.config.max_batch_bytes {
            return Err(ServiceError::InvalidMessage { reason: "message too large to deliver" });
        }

        let horizon =
            self.env.wall_clock_millis().saturating_add(MAX_FUTURE_SKEW.as_millis() as u64);
        message.timestamp = message.timestamp.min(horizon);

        let id = message.id.clone();
        let mut state = self.state.lock().expect("ChatService mutex poisoned");

        let outcome = state.log.append(message)?;
        match outcome {
            AppendOutcome::Appended { timestamp, dropped } => {
                tracing::debug!("Appended {} at {} (dropped {})", id, timestamp, dropped);
            },
            AppendOutcome::Duplicate { timestamp } => {
                tracing::debug!("Duplicate message {} already at {}", id, timestamp);
            },
        }

        Ok(Response::Sent { id, timestamp: outcome.timestamp() })
    }

    fn poll(&self, since: u64, username: &str) -> Response {
        let now = self.env.now();
        let mut state = self.state.lock().expect("ChatService mutex poisoned");

        state.presence.touch(username, now);
        self.evict(&mut state, now);

        let page = state.log.page(since, username, self.config.max_batch_bytes);
        if page.has_more {
            tracing::debug!("Paged poll for {}: {} message(s)", username, page.messages.len());
        }

        Response::Messages {
            messages: page.messages,
            users: state.presence.active_usernames(),
            public_keys: state.presence.all_public_keys_except(username),
            has_more: page.has_more,
        }
    }

    fn evict(&self, state: &mut State<E::Instant>, now: E::Instant) {
        let evicted = state.presence.evict_expired(now, self.config.presence_ttl);
        if !evicted.is_empty() {
            tracing::debug!("Evicted inactive users: {:?}", evicted);
        }
    }

    fn validate_username(&self, username: &str) -> Result<(), ServiceError> {
        if username.trim().is_empty() {
            return Err(ServiceError::InvalidUsername { reason: "username is empty".to_string() });
        }

        let chars = username.chars().count();
        if chars > self.config.max_username_len {
            return Err(ServiceError::InvalidUsername {
                reason: format!(
                    "{chars} characters exceeds limit of {}",
                    self.config.max_username_len
                ),
            });
        }

        Ok(())
    }

    /// Active usernames, sorted. Does not refresh or evict.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn active_usernames(&self) -> Vec<String> {
        self.state.lock().expect("ChatService mutex poisoned").presence.active_usernames()
    }

    /// Number of retained messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn message_count(&self) -> usize {
        self.state.lock().expect("ChatService mutex poisoned").log.len()
    }
}

/// Encoded size of the largest form `message` is ever delivered in.
fn largest_projection(message: &Message) -> usize {
    let size = |reader: &str| {
        codec::encoded_len(&ProjectedMessage::for_reader(message, reader)).unwrap_or(usize::MAX)
    };

    match &message.content {
        Content::Encrypted(bundles) => bundles.keys().map(|reader| size(reader)).max().unwrap_or(0),
        Content::Plaintext(_) | Content::LegacyEncrypted(_) => size(&message.sender),
    }
}
