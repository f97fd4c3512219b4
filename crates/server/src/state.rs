//! Application state shared across handlers.

use crate::auth::JwtKeys;
use shardbox_core::config::AppConfig;
use shardbox_drive::{DriveGateway, ManifestKeeper, TokenCipher};
use shardbox_metadata::MetadataStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Drive gateway.
    pub drive: Arc<dyn DriveGateway>,
    /// Per-drive manifest keeper.
    pub manifests: Arc<ManifestKeeper>,
    /// Process-wide credential cipher.
    pub cipher: Arc<TokenCipher>,
    /// Bearer-token keys.
    pub jwt: Arc<JwtKeys>,
    /// Outbound HTTP client (OAuth code exchange).
    pub http: reqwest::Client,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails; the encryption key and
    /// secrets must be bound before any handler runs.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        drive: Arc<dyn DriveGateway>,
    ) -> Self {
        if let Err(error) = config.validate() {
            panic!("invalid configuration: {error}");
        }

        let key = config
            .auth
            .decoded_token_key()
            .expect("validated token key");
        let cipher = Arc::new(TokenCipher::new(key));
        let jwt = Arc::new(JwtKeys::new(&config.auth.jwt_secret));
        let manifests = Arc::new(ManifestKeeper::new(drive.clone(), metadata.clone()));

        Self {
            config: Arc::new(config),
            metadata,
            drive,
            manifests,
            cipher,
            jwt,
            http: reqwest::Client::new(),
        }
    }
}
