//! Hybridchat server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! hybridchat-server --bind 0.0.0.0:4433
//!
//! # Start with TLS certificate (production)
//! hybridchat-server --bind 0.0.0.0:4433 --cert cert.pem --key key.pem
//! ```

use std::time::Duration;

use clap::Parser;
use hybridchat_server::{Server, ServerRuntimeConfig, ServiceConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Hybridchat relay server
#[derive(Parser, Debug)]
#[command(name = "hybridchat-server")]
#[command(about = "Relay server for hybrid end-to-end encrypted group chat")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long)]
    key: Option<String>,

    /// Number of messages retained in the log
    #[arg(long, default_value = "200")]
    capacity: usize,

    /// Seconds of silence before a user is dropped from presence
    #[arg(long, default_value = "30")]
    presence_ttl: u64,

    /// Maximum username length in characters
    #[arg(long, default_value = "64")]
    max_username_len: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Hybridchat server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        service: ServiceConfig {
            capacity: args.capacity,
            presence_ttl: Duration::from_secs(args.presence_ttl),
            max_username_len: args.max_username_len,
            ..ServiceConfig::default()
        },
    };

    let server = Server::bind(config)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
