//! Simulation server wrapper for testing with turmoil.
//!
//! `SimServer` puts a `ChatService` on `SimEnv` behind turmoil TCP. Each
//! connection is served by its own task, one request at a time.

use std::io::{self, ErrorKind};

use hybridchat_core::{ChatService, ServiceConfig};
use hybridchat_proto::{Request, Response, codec};
use turmoil::net::{TcpListener, TcpStream};

use crate::{SimEnv, frame_io};

/// Simulation server for testing with turmoil.
pub struct SimServer {
    service: ChatService<SimEnv>,
    listener: TcpListener,
}

impl SimServer {
    /// Create and bind a new simulation server.
    pub async fn bind(address: &str) -> io::Result<Self> {
        Self::bind_with_config(address, ServiceConfig::default()).await
    }

    /// Create and bind a new simulation server with custom config.
    pub async fn bind_with_config(address: &str, config: ServiceConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        let service = ChatService::new(SimEnv::new(), config)
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e.to_string()))?;

        Ok(Self { service, listener })
    }

    /// Handle to the service, sharing the server's state.
    pub fn service(&self) -> &ChatService<SimEnv> {
        &self.service
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::debug!("Accepted connection from {}", peer);

            let service = self.service.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, &service).await {
                    tracing::debug!("Connection from {} failed: {}", peer, e);
                }
            });
        }
    }
}

async fn serve_connection(mut stream: TcpStream, service: &ChatService<SimEnv>) -> io::Result<()> {
    while let Some(body) = frame_io::read_body(&mut stream).await? {
        let response = match codec::decode_body::<Request>(&body) {
            Ok(request) => service.handle(request),
            Err(e) => Response::Error { message: format!("invalid request: {e}") },
        };
        frame_io::write_frame(&mut stream, &response).await?;
    }

    Ok(())
}
