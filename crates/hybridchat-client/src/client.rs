//! Client state machine.
//!
//! The `Client` owns a user's keypair, the last known set of peers and their
//! public keys, and the poll cursor. It never performs I/O: requests leave as
//! [`ClientAction::Send`] and their outcomes come back as events.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use hybridchat_core::Environment;
use hybridchat_crypto::{
    CryptoError, EncodedPublicKey, KeyPair, decrypt_own, encrypt_for_recipients,
};
use hybridchat_proto::{
    BundleWire, Content, Message, ProjectedContent, ProjectedMessage, Request, Response,
};

use crate::{
    bundle,
    error::ClientError,
    event::{ChatMessage, ClientAction, ClientEvent, MessageBody},
    rng::EnvRng,
};

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default message length limit in characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 1000;

/// Default display time for notices.
pub const DEFAULT_NOTICE_TIMEOUT: Duration = Duration::from_secs(3);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Minimum time between two polls
    pub poll_interval: Duration,
    /// Longest message accepted by `SendMessage`, in characters
    pub max_message_chars: usize,
    /// Display time attached to every `Notice`
    pub notice_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            notice_timeout: DEFAULT_NOTICE_TIMEOUT,
        }
    }
}

/// Chat client for one user.
pub struct Client<E: Environment> {
    /// Environment for randomness, timing, etc.
    env: E,

    config: ClientConfig,

    username: String,

    /// Generated once per session; the private half never leaves the client.
    key_pair: KeyPair,

    /// Public keys of every other present user, as last reported.
    peers: BTreeMap<String, EncodedPublicKey>,

    /// Present usernames, sorted, ourselves included.
    users: Vec<String>,

    /// Highest log timestamp seen. Polls ask for anything newer.
    cursor: u64,

    join_requested: bool,
    join_in_flight: bool,
    joined: bool,

    /// Whether the last request reached the server.
    connected: bool,

    last_poll: Option<E::Instant>,
    poll_in_flight: bool,

    /// Timestamp of the last composed message. Composed timestamps strictly
    /// increase, which fixes the order of the outbox.
    last_composed: u64,

    /// Message requests waiting for the connection to come back.
    outbox: VecDeque<Request>,
}

impl<E: Environment> Client<E> {
    /// Create a client for `username` with a freshly generated keypair.
    ///
    /// Key generation is left to the caller because it is slow enough to
    /// block an async runtime.
    pub fn new(
        env: E,
        username: impl Into<String>,
        key_pair: KeyPair,
        config: ClientConfig,
    ) -> Self {
        Self {
            env,
            config,
            username: username.into(),
            key_pair,
            peers: BTreeMap::new(),
            users: Vec::new(),
            cursor: 0,
            join_requested: false,
            join_in_flight: false,
            joined: false,
            connected: false,
            last_poll: None,
            poll_in_flight: false,
            last_composed: 0,
            outbox: VecDeque::new(),
        }
    }

    /// Environment the client draws time and randomness from.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Our username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Our encoded public key, as sent in the join request.
    pub fn public_key(&self) -> EncodedPublicKey {
        self.key_pair.export_public()
    }

    /// Whether the server has accepted our join.
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Whether the last request reached the server.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Present usernames as last reported by the server.
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Usernames we currently encrypt for.
    pub fn peers(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }

    /// Poll cursor.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Number of message requests waiting for a connection.
    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// Only `SendMessage` fails; on error nothing is sent or buffered.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Join => Ok(self.handle_join()),
            ClientEvent::SendMessage { text } => self.handle_send_message(text),
            ClientEvent::Tick { now } => Ok(self.handle_tick(now)),
            ClientEvent::ResponseReceived(response) => Ok(self.handle_response(response)),
            ClientEvent::RequestFailed { request, reason } => {
                Ok(self.handle_request_failed(request, &reason))
            },
        }
    }

    fn handle_join(&mut self) -> Vec<ClientAction> {
        self.join_requested = true;
        self.join_request().into_iter().collect()
    }

    fn join_request(&mut self) -> Option<ClientAction> {
        if self.join_in_flight {
            return None;
        }
        self.join_in_flight = true;

        Some(ClientAction::Send(Request::Join {
            username: self.username.clone(),
            public_key: self.key_pair.export_public().into_string(),
        }))
    }

    fn handle_send_message(&mut self, text: String) -> Result<Vec<ClientAction>, ClientError> {
        if !self.joined {
            return Err(ClientError::NotJoined);
        }

        let len = text.chars().count();
        if len > self.config.max_message_chars {
            return Err(ClientError::MessageTooLong { len, max: self.config.max_message_chars });
        }

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut actions = Vec::new();

        let content = if self.peers.is_empty() {
            Content::Plaintext(text.clone())
        } else {
            let recipients = self.peers.iter().map(|(name, key)| (name.as_str(), key));
            let fanout =
                encrypt_for_recipients(text.as_bytes(), recipients, &mut EnvRng::new(&self.env))?;

            if let Some(partial) = fanout.partial_failure() {
                actions.push(self.notice(format!("Message not encrypted for everyone: {partial}")));
            }

            let bundles = fanout
                .into_bundles()
                .into_iter()
                .map(|(name, b)| (name, bundle::encode(&b)))
                .collect();
            Content::Encrypted(bundles)
        };

        self.last_composed = self.env.wall_clock_millis().max(self.last_composed + 1);
        let message = Message {
            id: format!("{:032x}", self.env.random_u128()),
            sender: self.username.clone(),
            timestamp: self.last_composed,
            content,
        };

        actions.push(ClientAction::DeliverMessage(ChatMessage {
            id: message.id.clone(),
            sender: message.sender.clone(),
            body: MessageBody::Text(text),
            encrypted: message.is_encrypted(),
            timestamp: message.timestamp,
        }));

        let request = Request::Message(message);
        if self.connected {
            actions.push(ClientAction::Send(request));
        } else {
            self.outbox.push_back(request);
            actions.push(ClientAction::Log {
                message: format!("Offline, {} message(s) queued", self.outbox.len()),
            });
        }

        Ok(actions)
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<ClientAction> {
        let mut actions = Vec::new();

        if self.join_requested && !self.joined {
            actions.extend(self.join_request());
            return actions;
        }

        if !self.joined || self.poll_in_flight {
            return actions;
        }

        let due = self.last_poll.is_none_or(|last| now - last >= self.config.poll_interval);
        if due {
            actions.push(self.poll_request(now));
        }

        actions
    }

    fn poll_request(&mut self, now: E::Instant) -> ClientAction {
        self.last_poll = Some(now);
        self.poll_in_flight = true;
        ClientAction::Send(Request::Poll { since: self.cursor, username: self.username.clone() })
    }

    fn handle_response(&mut self, response: Response) -> Vec<ClientAction> {
        let mut actions = Vec::new();

        if !self.connected {
            self.connected = true;
            actions.push(ClientAction::ConnectionChanged { connected: true });
            actions.extend(self.outbox.drain(..).map(ClientAction::Send));
        }

        match response {
            Response::Joined { users, public_keys, cursor } => {
                self.join_in_flight = false;
                self.joined = true;
                // A re-join after presence expiry keeps the old cursor so
                // nothing in between is skipped
                if self.cursor == 0 {
                    self.cursor = cursor;
                }
                actions.push(ClientAction::Log {
                    message: format!(
                        "Joined as {} with {} peer(s)",
                        self.username,
                        public_keys.len()
                    ),
                });
                self.update_presence(users, public_keys, &mut actions);
            },
            Response::Sent { id, timestamp } => {
                actions.push(ClientAction::Log {
                    message: format!("Message {id} stored at {timestamp}"),
                });
            },
            Response::Messages { messages, users, public_keys, has_more } => {
                self.poll_in_flight = false;
                self.deliver(messages, &mut actions);

                let present = users.iter().any(|user| *user == self.username);
                self.update_presence(users, public_keys, &mut actions);

                if self.joined && !present {
                    actions.push(ClientAction::Log {
                        message: "Dropped from presence, joining again".to_string(),
                    });
                    actions.extend(self.join_request());
                } else if self.joined && has_more {
                    // Server paged the reply; fetch the rest without waiting
                    actions.push(self.poll_request(self.env.now()));
                }
            },
            Response::Error { message } => {
                self.poll_in_flight = false;
                if self.join_in_flight && !self.joined {
                    // The server refused the join itself; retrying the same
                    // username would only be refused again
                    self.join_in_flight = false;
                    self.join_requested = false;
                }
                actions.push(self.notice(format!("Server error: {message}")));
            },
        }

        actions
    }

    fn deliver(&mut self, messages: Vec<ProjectedMessage>, actions: &mut Vec<ClientAction>) {
        let mut failures = 0usize;

        for message in messages {
            self.cursor = self.cursor.max(message.timestamp);

            // Already shown as a local echo
            if message.sender == self.username {
                continue;
            }

            let encrypted = message.is_encrypted();
            let body = match message.content {
                ProjectedContent::Plaintext(text) => MessageBody::Text(text),
                ProjectedContent::Placeholder => MessageBody::NotAddressed,
                ProjectedContent::Encrypted(wire) => match self.open(&wire) {
                    Ok(text) => MessageBody::Text(text),
                    Err(e) => {
                        failures += 1;
                        actions.push(ClientAction::Log {
                            message: format!("Failed to decrypt message {}: {e}", message.id),
                        });
                        MessageBody::Undecryptable { reason: e.to_string() }
                    },
                },
            };

            actions.push(ClientAction::DeliverMessage(ChatMessage {
                id: message.id,
                sender: message.sender,
                body,
                encrypted,
                timestamp: message.timestamp,
            }));
        }

        if failures > 0 {
            actions.push(self.notice(format!("Failed to decrypt {failures} message(s)")));
        }
    }

    fn open(&self, wire: &BundleWire) -> Result<String, CryptoError> {
        let cipher_bundle = bundle::decode(wire)?;
        let plaintext = decrypt_own(&cipher_bundle, &self.key_pair)?;
        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::Decryption { reason: "plaintext is not UTF-8".to_string() })
    }

    fn update_presence(
        &mut self,
        users: Vec<String>,
        public_keys: BTreeMap<String, String>,
        actions: &mut Vec<ClientAction>,
    ) {
        self.peers = public_keys
            .into_iter()
            .filter(|(name, _)| *name != self.username)
            .map(|(name, key)| (name, EncodedPublicKey::new(key)))
            .collect();

        if users != self.users {
            self.users = users;
            actions.push(ClientAction::UsersChanged { users: self.users.clone() });
        }
    }

    fn handle_request_failed(&mut self, request: Request, reason: &str) -> Vec<ClientAction> {
        let mut actions = vec![ClientAction::Log {
            message: format!("{} request failed: {reason}", request.kind()),
        }];

        if self.connected {
            self.connected = false;
            actions.push(ClientAction::ConnectionChanged { connected: false });
        }

        match request {
            Request::Message(message) => self.requeue(message),
            Request::Poll { .. } => self.poll_in_flight = false,
            Request::Join { .. } => self.join_in_flight = false,
        }

        actions
    }

    /// Put a failed message back in composed order. Several sends can fail
    /// in one outbox flush, in any order.
    fn requeue(&mut self, message: Message) {
        let at = self
            .outbox
            .iter()
            .position(|queued| {
                matches!(queued, Request::Message(q) if q.timestamp > message.timestamp)
            })
            .unwrap_or(self.outbox.len());
        self.outbox.insert(at, Request::Message(message));
    }

    fn notice(&self, message: String) -> ClientAction {
        ClientAction::Notice { message, timeout: self.config.notice_timeout }
    }
}
