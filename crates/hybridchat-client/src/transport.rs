//! QUIC transport for the client.
//!
//! A thin request/response layer: every request opens its own bidirectional
//! stream, writes one frame and reads one frame back. Protocol logic remains
//! in the Sans-IO [`Client`]; [`run_session`] only shuttles requests and
//! responses and never blocks the runtime on RSA work.

use std::{
    collections::VecDeque,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use bytes::BytesMut;
use hybridchat_core::Environment;
use hybridchat_crypto::{CryptoError, KeyPair};
use hybridchat_proto::{ALPN_PROTOCOL, ProtocolError, Request, Response, codec};
use quinn::{ClientConfig, Endpoint};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    client::Client,
    error::ClientError,
    event::{ClientAction, ClientEvent},
    rng::EnvRng,
};

/// How often the session wakes the client to check whether a poll is due.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Connections silent for this long are torn down by QUIC.
const IDLE_TIMEOUT_MS: u32 = 30_000;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Key generation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Blocking task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

/// An open QUIC connection to a Hybridchat server.
pub struct Connection {
    endpoint: Endpoint,
    connection: quinn::Connection,
}

impl Connection {
    /// Send one request and wait for its response.
    pub async fn request(&self, request: &Request) -> Result<Response, TransportError> {
        let (mut send, mut recv) = self
            .connection
            .open_bi()
            .await
            .map_err(|e| TransportError::Stream(format!("open_bi failed: {e}")))?;

        let frame = codec::to_frame(request)?;
        send.write_all(&frame)
            .await
            .map_err(|e| TransportError::Stream(format!("write failed: {e}")))?;
        send.finish().map_err(|e| TransportError::Stream(format!("finish failed: {e}")))?;

        let mut prefix = [0u8; codec::PREFIX_SIZE];
        recv.read_exact(&mut prefix)
            .await
            .map_err(|e| TransportError::Stream(format!("prefix read failed: {e}")))?;

        let body_len = codec::body_length(prefix)?;
        let mut body = BytesMut::zeroed(body_len);
        recv.read_exact(&mut body)
            .await
            .map_err(|e| TransportError::Stream(format!("body read failed: {e}")))?;

        Ok(codec::decode_body(&body)?)
    }

    /// Remote server address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Close the connection and its endpoint.
    pub fn close(&self) {
        self.connection.close(0u32.into(), b"bye");
        self.endpoint.close(0u32.into(), b"bye");
    }
}

/// Connect to a Hybridchat server via QUIC.
pub async fn connect(server_addr: &str) -> Result<Connection, TransportError> {
    let addr: SocketAddr = server_addr
        .parse()
        .map_err(|e| TransportError::Connection(format!("invalid address: {e}")))?;

    let client_config = insecure_client_config()?;
    let mut endpoint = Endpoint::client(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
        .map_err(|e| TransportError::Connection(format!("endpoint creation failed: {e}")))?;
    endpoint.set_default_client_config(client_config);

    let connection = endpoint
        .connect(addr, "localhost")
        .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?
        .await
        .map_err(|e| TransportError::Connection(format!("connection failed: {e}")))?;

    Ok(Connection { endpoint, connection })
}

/// Generate a keypair without blocking the async runtime.
pub async fn generate_key_pair<E: Environment>(env: E) -> Result<KeyPair, TransportError> {
    let key_pair = tokio::task::spawn_blocking(move || KeyPair::generate(&mut EnvRng::new(&env)))
        .await
        .map_err(|e| TransportError::Task(e.to_string()))??;

    Ok(key_pair)
}

/// Drive `client` against the server at `server_addr` until `input` closes.
///
/// Lines received on `input` are sent as chat messages. Every action other
/// than [`ClientAction::Send`] is forwarded to `output`; sends are executed
/// here and their outcomes fed back into the client. A failed request drops
/// the connection, and the next request dials again.
///
/// Returns the client so the caller can inspect its final state.
pub async fn run_session<E: Environment>(
    server_addr: &str,
    mut client: Client<E>,
    mut input: mpsc::Receiver<String>,
    output: mpsc::Sender<ClientAction>,
) -> Result<Client<E>, TransportError> {
    let env = client.env().clone();
    let mut link: Option<Connection> = None;
    let mut pending = VecDeque::from([ClientEvent::Join]);

    loop {
        while let Some(event) = pending.pop_front() {
            let (returned, result) = handle_blocking(client, event).await?;
            client = returned;

            let actions = result.unwrap_or_else(|e| {
                vec![ClientAction::Notice {
                    message: e.to_string(),
                    timeout: client.config().notice_timeout,
                }]
            });

            for action in actions {
                match action {
                    ClientAction::Send(request) => {
                        let event = match exchange(server_addr, &mut link, &request).await {
                            Ok(response) => ClientEvent::ResponseReceived(response),
                            Err(e) => {
                                tracing::debug!("{} request failed: {}", request.kind(), e);
                                ClientEvent::RequestFailed { request, reason: e.to_string() }
                            },
                        };
                        pending.push_back(event);
                    },
                    other => {
                        if output.send(other).await.is_err() {
                            return Ok(shutdown(client, link));
                        }
                    },
                }
            }
        }

        tokio::select! {
            text = input.recv() => match text {
                Some(text) => pending.push_back(ClientEvent::SendMessage { text }),
                None => return Ok(shutdown(client, link)),
            },
            () = env.sleep(TICK_INTERVAL) => {
                pending.push_back(ClientEvent::Tick { now: env.now() });
            },
        }
    }
}

fn shutdown<E: Environment>(client: Client<E>, link: Option<Connection>) -> Client<E> {
    if let Some(connection) = link {
        connection.close();
    }
    client
}

type Handled<E> = (Client<E>, Result<Vec<ClientAction>, ClientError>);

/// Run one `Client::handle` call on the blocking pool. Encryption and
/// decryption are RSA operations.
async fn handle_blocking<E: Environment>(
    mut client: Client<E>,
    event: ClientEvent<E::Instant>,
) -> Result<Handled<E>, TransportError> {
    tokio::task::spawn_blocking(move || {
        let result = client.handle(event);
        (client, result)
    })
    .await
    .map_err(|e| TransportError::Task(e.to_string()))
}

async fn exchange(
    server_addr: &str,
    link: &mut Option<Connection>,
    request: &Request,
) -> Result<Response, TransportError> {
    if link.is_none() {
        let connection = connect(server_addr).await?;
        tracing::debug!("Connected to {}", connection.remote_addr());
        *link = Some(connection);
    }

    let Some(connection) = link.as_ref() else {
        return Err(TransportError::Connection("not connected".to_string()));
    };

    let result = connection.request(request).await;
    if result.is_err()
        && let Some(connection) = link.take()
    {
        connection.close();
    }
    result
}

/// Create an insecure client config that accepts any certificate.
///
/// WARNING: Development only. Production should verify certificates. Message
/// confidentiality does not depend on TLS, but presence and metadata do.
fn insecure_client_config() -> Result<ClientConfig, TransportError> {
    let mut crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
        .with_no_client_auth();

    // Must match server's ALPN protocol
    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let quic_crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| TransportError::Connection(format!("QUIC config error: {e}")))?;
    let mut config = ClientConfig::new(Arc::new(quic_crypto));

    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(quinn::VarInt::from_u32(IDLE_TIMEOUT_MS).into()));
    config.transport_config(Arc::new(transport));

    Ok(config)
}

/// Certificate verifier that accepts any certificate (insecure, for
/// development).
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
