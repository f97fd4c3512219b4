//! Drive gateway error types.

use thiserror::Error;

/// Errors surfaced by the drive gateway and manifest keeper.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no drive accounts linked")]
    NoLinkedAccounts,

    #[error("credential error: {0}")]
    Credential(String),

    #[error("drive API returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] shardbox_metadata::MetadataError),

    #[error("manifest error: {0}")]
    Manifest(String),
}

/// Result type for drive operations.
pub type DriveResult<T> = std::result::Result<T, DriveError>;
