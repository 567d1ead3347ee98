//! Hybridchat production server.
//!
//! Production server implementation using Quinn for QUIC transport, Tokio for
//! async runtime, and system time with cryptographic RNG.
//!
//! # Architecture
//!
//! This crate provides production "glue" around [`hybridchat_core`]'s Sans-IO
//! [`ChatService`]. Each client request arrives on its own bidirectional QUIC
//! stream as one length-prefixed JSON frame; the server decodes it, hands it
//! to the service and writes the response frame back on the same stream.
//!
//! # Components
//!
//! - [`Server`]: Production runtime around the chat service
//! - [`QuinnTransport`]: QUIC transport via Quinn library
//! - [`SystemEnv`]: Production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod system_env;
mod transport;

use bytes::BytesMut;
pub use error::ServerError;
pub use hybridchat_core::{ChatService, ServiceConfig};
use hybridchat_proto::{Request, Response, codec};
pub use system_env::SystemEnv;
pub use transport::{QuinnConnection, QuinnTransport};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4433")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Chat service configuration (log capacity, presence TTL)
    pub service: ServiceConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            service: ServiceConfig::default(),
        }
    }
}

/// Production Hybridchat server.
///
/// Wraps `ChatService` with Quinn QUIC transport and system environment.
pub struct Server {
    service: ChatService<SystemEnv>,
    transport: QuinnTransport,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let service = ChatService::new(SystemEnv::new(), config.service)?;
        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { service, transport })
    }

    /// Run the server, accepting connections and serving requests.
    ///
    /// This method runs until the endpoint is closed.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let service = self.service.clone();
                    tokio::spawn(handle_connection(conn, service));
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Handle to the chat service, sharing the server's state.
    pub fn service(&self) -> &ChatService<SystemEnv> {
        &self.service
    }
}

/// Serve every request stream of a single QUIC connection.
async fn handle_connection(conn: QuinnConnection, service: ChatService<SystemEnv>) {
    tracing::debug!("New connection from {}", conn.remote_addr());

    loop {
        match conn.accept_bi().await {
            Ok((send, recv)) => {
                let service = service.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_stream(send, recv, &service).await {
                        tracing::debug!("Stream error: {}", e);
                    }
                });
            },
            Err(e) => {
                tracing::debug!("Connection closed: {}", e);
                break;
            },
        }
    }
}

/// Read one request frame, answer it, and finish the stream.
///
/// A frame that decodes to JSON but not to a valid request is answered with
/// an error response; only framing failures drop the stream.
async fn handle_stream(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    service: &ChatService<SystemEnv>,
) -> Result<(), ServerError> {
    let mut prefix = [0u8; codec::PREFIX_SIZE];
    recv.read_exact(&mut prefix)
        .await
        .map_err(|e| ServerError::Transport(format!("prefix read failed: {e}")))?;

    let body_len = codec::body_length(prefix)?;
    let mut body = BytesMut::zeroed(body_len);
    recv.read_exact(&mut body)
        .await
        .map_err(|e| ServerError::Transport(format!("body read failed: {e}")))?;

    let response = match codec::decode_body::<Request>(&body) {
        Ok(request) => {
            tracing::debug!("Handling {} request", request.kind());
            service.handle(request)
        },
        Err(e) => {
            tracing::warn!("Request decode error: {}", e);
            Response::Error { message: format!("invalid request: {e}") }
        },
    };

    let wire = match codec::to_frame(&response) {
        Ok(wire) => wire,
        Err(e) => {
            tracing::warn!("Response encode error: {}", e);
            codec::to_frame(&Response::Error { message: format!("response not sent: {e}") })?
        },
    };
    send.write_all(&wire)
        .await
        .map_err(|e| ServerError::Transport(format!("write failed: {e}")))?;
    send.finish().map_err(|e| ServerError::Transport(format!("finish failed: {e}")))?;

    Ok(())
}
