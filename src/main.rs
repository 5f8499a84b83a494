use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;

use beacon_auth::TokenKeys;
use beacon_server::{allow_all_origins, allow_origins, ServerConfig};
use beacon_store::Database;

/// Authenticated API server with a real-time broadcast channel.
#[derive(Debug, Parser)]
#[command(name = "beacon", version)]
struct Args {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind.
    #[arg(long, default_value_t = 4000)]
    port: u16,

    /// Path to the SQLite database (defaults to ~/.beacon/database/beacon.db).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Origins allowed to open WebSocket connections (repeatable).
    /// With none given, every origin is accepted.
    #[arg(long = "allow-origin")]
    allowed_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Values in .env are visible before any config is read
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    let keys = TokenKeys::from_secret(&SecretString::from(secret));

    let db_path = args.db_path.unwrap_or_else(default_db_path);
    let db = Database::open(&db_path).context("failed to open database")?;

    let origin_policy = if args.allowed_origins.is_empty() {
        allow_all_origins()
    } else {
        allow_origins(args.allowed_origins)
    };

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };

    let handle = beacon_server::start(config, db, keys, origin_policy)
        .await
        .context("failed to start server")?;
    tracing::info!(addr = %handle.addr, "beacon ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

fn default_db_path() -> PathBuf {
    dirs_home().join(".beacon").join("database").join("beacon.db")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
