//! Configuration types shared across crates.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Public base URL used for the OAuth redirect (no trailing slash).
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_url: default_base_url(),
        }
    }
}

impl ServerConfig {
    /// Base URL with any trailing slash removed.
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// SQLite database file path.
    #[serde(default = "default_metadata_path")]
    pub path: PathBuf,
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("./data/metadata.db")
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: default_metadata_path(),
        }
    }
}

/// Authentication configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens.
    pub jwt_secret: String,
    /// Base64 of the process-wide 32-byte token-encryption key.
    pub token_enc_key: String,
}

impl AuthConfig {
    /// Decode and validate the token-encryption key.
    pub fn decoded_token_key(&self) -> Result<[u8; 32], String> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.token_enc_key)
            .map_err(|e| format!("token_enc_key must be valid base64: {e}"))?;
        bytes.as_slice().try_into().map_err(|_| {
            format!(
                "token_enc_key must decode to exactly 32 bytes for AES-256, got {}",
                bytes.len()
            )
        })
    }
}

/// Drive provider OAuth configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Upload ingest and pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory for session temp files, sharded by session id.
    #[serde(default = "default_upload_temp_dir")]
    pub temp_dir: PathBuf,
    /// Maximum accepted file size in GiB.
    #[serde(default = "default_max_file_size_gb")]
    pub max_file_size_gb: u64,
    /// Upload session lifetime in hours.
    #[serde(default = "default_session_expiry_hours")]
    pub session_expiry_hours: u64,
    /// Per-user cap on sessions in {uploading, processing}.
    #[serde(default = "default_max_concurrent_per_user")]
    pub max_concurrent_per_user: u64,
    /// Delay before temp artifacts are deleted, in minutes.
    #[serde(default = "default_temp_file_cleanup_minutes")]
    pub temp_file_cleanup_minutes: u64,
}

fn default_upload_temp_dir() -> PathBuf {
    PathBuf::from("/tmp/2xpfm_uploads")
}

fn default_max_file_size_gb() -> u64 {
    100
}

fn default_session_expiry_hours() -> u64 {
    1
}

fn default_max_concurrent_per_user() -> u64 {
    1
}

fn default_temp_file_cleanup_minutes() -> u64 {
    10
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_upload_temp_dir(),
            max_file_size_gb: default_max_file_size_gb(),
            session_expiry_hours: default_session_expiry_hours(),
            max_concurrent_per_user: default_max_concurrent_per_user(),
            temp_file_cleanup_minutes: default_temp_file_cleanup_minutes(),
        }
    }
}

impl UploadConfig {
    /// Maximum accepted file size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_gb * 1024 * 1024 * 1024
    }

    /// Session lifetime as a Duration.
    pub fn session_expiry(&self) -> time::Duration {
        time::Duration::hours(self.session_expiry_hours.min(i64::MAX as u64) as i64)
    }

    /// Temp-file cleanup delay as a Duration.
    pub fn temp_file_cleanup(&self) -> Duration {
        Duration::from_secs(self.temp_file_cleanup_minutes * 60)
    }
}

/// Download pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory for download temp files.
    #[serde(default = "default_download_temp_dir")]
    pub temp_dir: PathBuf,
    /// Bound on concurrent chunk fetches (1 = serial).
    #[serde(default = "default_max_parallel_downloads")]
    pub max_parallel_downloads: usize,
    /// Download session lifetime in hours.
    #[serde(default = "default_download_session_expiry_hours")]
    pub session_expiry_hours: u64,
}

fn default_download_temp_dir() -> PathBuf {
    PathBuf::from("/tmp/2xpfm_downloads")
}

fn default_max_parallel_downloads() -> usize {
    1
}

fn default_download_session_expiry_hours() -> u64 {
    1
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_download_temp_dir(),
            max_parallel_downloads: default_max_parallel_downloads(),
            session_expiry_hours: default_download_session_expiry_hours(),
        }
    }
}

impl DownloadConfig {
    /// Session lifetime as a Duration.
    pub fn session_expiry(&self) -> time::Duration {
        time::Duration::hours(self.session_expiry_hours.min(i64::MAX as u64) as i64)
    }
}

/// Obfuscation codec configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObfuscationConfig {
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    #[serde(default = "default_overhead_pct")]
    pub overhead_pct: f64,
    #[serde(default = "default_min_gap")]
    pub min_gap: u64,
}

fn default_block_size() -> u32 {
    256
}

fn default_overhead_pct() -> f64 {
    8.0
}

fn default_min_gap() -> u64 {
    4096
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            overhead_pct: default_overhead_pct(),
            min_gap: default_min_gap(),
        }
    }
}

impl ObfuscationConfig {
    /// Convert to codec parameters.
    pub fn params(&self) -> crate::obfuscate::ObfuscationParams {
        crate::obfuscate::ObfuscationParams {
            block_size: self.block_size,
            overhead_pct: self.overhead_pct,
            min_gap: self.min_gap,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Secrets (required).
    pub auth: AuthConfig,
    /// Drive provider credentials (required).
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub obfuscation: ObfuscationConfig,
}

impl AppConfig {
    /// Validate cross-field invariants; returns an error message per
    /// offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.auth.jwt_secret.is_empty() {
            return Err("auth.jwt_secret must not be empty".to_string());
        }
        self.auth.decoded_token_key()?;
        self.obfuscation
            .params()
            .validate()
            .map_err(|e| e.to_string())?;
        if self.upload.max_file_size_gb == 0 {
            return Err("upload.max_file_size_gb must be positive".to_string());
        }
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses a fixed all-zero token key and a dummy
    /// JWT secret.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            metadata: MetadataConfig::default(),
            auth: AuthConfig {
                jwt_secret: "test-jwt-secret".to_string(),
                token_enc_key: base64::engine::general_purpose::STANDARD.encode([0u8; 32]),
            },
            oauth: OAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
            },
            upload: UploadConfig::default(),
            download: DownloadConfig::default(),
            obfuscation: ObfuscationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::for_testing();
        assert_eq!(config.upload.max_file_size_gb, 100);
        assert_eq!(config.upload.session_expiry_hours, 1);
        assert_eq!(config.upload.max_concurrent_per_user, 1);
        assert_eq!(config.upload.temp_file_cleanup_minutes, 10);
        assert_eq!(config.download.max_parallel_downloads, 1);
        assert_eq!(config.download.session_expiry_hours, 1);
        assert_eq!(config.obfuscation.block_size, 256);
        assert_eq!(config.obfuscation.overhead_pct, 8.0);
        assert_eq!(config.obfuscation.min_gap, 4096);
    }

    #[test]
    fn test_for_testing_validates() {
        AppConfig::for_testing().validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_token_key() {
        let mut config = AppConfig::for_testing();
        config.auth.token_enc_key = "not-base64!!!".to_string();
        assert!(config.validate().is_err());

        config.auth.token_enc_key =
            base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let err = config.validate().unwrap_err();
        assert!(err.contains("32 bytes"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "auth": {"jwt_secret": "s", "token_enc_key": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="},
            "oauth": {"client_id": "c", "client_secret": "x"}
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.upload.max_file_size_gb, 100);
    }

    #[test]
    fn test_base_url_normalization() {
        let mut server = ServerConfig::default();
        server.base_url = "https://example.com/".to_string();
        assert_eq!(server.normalized_base_url(), "https://example.com");
    }

    #[test]
    fn test_max_file_size_bytes() {
        let upload = UploadConfig {
            max_file_size_gb: 2,
            ..Default::default()
        };
        assert_eq!(upload.max_file_size_bytes(), 2 * 1024 * 1024 * 1024);
    }
}
