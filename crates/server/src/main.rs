//! Shardbox server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use shardbox_core::config::AppConfig;
use shardbox_drive::{GoogleDrive, TokenCipher};
use shardbox_metadata::{MetadataStore, SqliteStore};
use shardbox_server::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between expired-session sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shardbox - split-file storage across user cloud drives
#[derive(Parser, Debug)]
#[command(name = "shardboxd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SHARDBOX_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Shardbox v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override
    // everything under the SHARDBOX_ prefix).
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SHARDBOX_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Temp directories must exist before the first chunk request lands.
    std::fs::create_dir_all(&config.upload.temp_dir)
        .context("failed to create upload temp dir")?;
    std::fs::create_dir_all(&config.download.temp_dir)
        .context("failed to create download temp dir")?;

    // Initialize metadata store
    let metadata: Arc<dyn MetadataStore> = Arc::new(
        SqliteStore::new(&config.metadata.path)
            .await
            .context("failed to initialize metadata store")?,
    );
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("Metadata store initialized");

    // Initialize the drive gateway
    let key = config
        .auth
        .decoded_token_key()
        .map_err(|e| anyhow::anyhow!(e))?;
    let cipher = Arc::new(TokenCipher::new(key));
    let drive = Arc::new(GoogleDrive::new(
        metadata.clone(),
        cipher,
        config.oauth.client_id.clone(),
        config.oauth.client_secret.clone(),
    ));
    tracing::info!("Drive gateway initialized");

    let state = AppState::new(config.clone(), metadata, drive);

    // Expired sessions and their temp files are reaped in the background.
    let _sweeper = shardbox_server::sweeper::spawn_session_sweeper(state.clone(), SWEEP_INTERVAL);

    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
