//! Simulated client driver.
//!
//! `SimClient` executes a `Client<SimEnv>`'s actions over turmoil TCP and
//! records everything the application layer would see. Connectivity can be
//! switched off to exercise the outbox without relying on network faults.

use std::{
    collections::VecDeque,
    io::{self, ErrorKind},
};

use hybridchat_client::{
    ChatMessage, Client, ClientAction, ClientConfig, ClientError, ClientEvent, EnvRng,
};
use hybridchat_core::Environment;
use hybridchat_crypto::{CryptoError, KeyPair};
use hybridchat_proto::{Request, Response, codec};
use turmoil::net::TcpStream;

use crate::{SimEnv, frame_io};

/// A chat participant inside a turmoil simulation.
pub struct SimClient {
    client: Client<SimEnv>,
    env: SimEnv,
    server: String,
    stream: Option<TcpStream>,
    online: bool,
    messages: Vec<ChatMessage>,
    notices: Vec<String>,
    users: Vec<String>,
}

impl SimClient {
    /// Create a client whose keypair and randomness derive from `seed`.
    pub fn new(
        username: &str,
        server: &str,
        seed: u64,
        config: ClientConfig,
    ) -> Result<Self, CryptoError> {
        let env = SimEnv::with_seed(seed);
        let key_pair = KeyPair::generate(&mut EnvRng::new(&env))?;

        Ok(Self {
            client: Client::new(env.clone(), username, key_pair, config),
            env,
            server: server.to_string(),
            stream: None,
            online: true,
            messages: Vec::new(),
            notices: Vec::new(),
            users: Vec::new(),
        })
    }

    /// The wrapped state machine.
    pub fn client(&self) -> &Client<SimEnv> {
        &self.client
    }

    /// Messages delivered so far, local echoes included.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages from other senders.
    pub fn received(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.sender != self.client.username())
    }

    /// Notices shown so far.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Present users as last reported.
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Cut or restore connectivity. Requests made while offline fail.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
        if !online {
            self.stream = None;
        }
    }

    /// Join the chat.
    pub async fn join(&mut self) -> Result<(), ClientError> {
        self.dispatch(ClientEvent::Join).await
    }

    /// Send a chat message.
    pub async fn send(&mut self, text: &str) -> Result<(), ClientError> {
        self.dispatch(ClientEvent::SendMessage { text: text.to_string() }).await
    }

    /// Deliver a tick at the current virtual time.
    pub async fn tick(&mut self) -> Result<(), ClientError> {
        self.dispatch(ClientEvent::Tick { now: self.env.now() }).await
    }

    /// Send a raw request, bypassing the state machine.
    pub async fn request(&mut self, request: &Request) -> io::Result<Response> {
        if !self.online {
            return Err(io::Error::new(ErrorKind::NotConnected, "offline"));
        }

        if self.stream.is_none() {
            self.stream = Some(TcpStream::connect(self.server.as_str()).await?);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::Error::new(ErrorKind::NotConnected, "no stream"));
        };

        let result = exchange(stream, request).await;
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    async fn dispatch(
        &mut self,
        event: ClientEvent<tokio::time::Instant>,
    ) -> Result<(), ClientError> {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            for action in self.client.handle(event)? {
                match action {
                    ClientAction::Send(request) => {
                        let event = match self.request(&request).await {
                            Ok(response) => ClientEvent::ResponseReceived(response),
                            Err(e) => {
                                ClientEvent::RequestFailed { request, reason: e.to_string() }
                            },
                        };
                        pending.push_back(event);
                    },
                    ClientAction::DeliverMessage(message) => self.messages.push(message),
                    ClientAction::UsersChanged { users } => self.users = users,
                    ClientAction::Notice { message, .. } => self.notices.push(message),
                    ClientAction::ConnectionChanged { connected } => {
                        tracing::debug!("{} connected: {}", self.client.username(), connected);
                    },
                    ClientAction::Log { message } => {
                        tracing::debug!("{}: {}", self.client.username(), message);
                    },
                }
            }
        }

        Ok(())
    }
}

async fn exchange(stream: &mut TcpStream, request: &Request) -> io::Result<Response> {
    frame_io::write_frame(stream, request).await?;

    let body = frame_io::read_body(stream)
        .await?
        .ok_or_else(|| io::Error::new(ErrorKind::UnexpectedEof, "server closed the stream"))?;

    codec::decode_body(&body).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
}
