//! Key file structure and serialization.
//!
//! The key file is the only artifact required to reconstruct a stored file,
//! together with access to the referenced drive accounts. It is emitted to
//! the client at the end of the upload pipeline and never persisted
//! server-side past the temp-file cleanup window.

use crate::{Error, FileId, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;
use uuid::Uuid;

/// Key file format version.
pub const KEY_FILE_VERSION: &str = "1.0";

/// Obfuscation block carried in the key file; everything the inverse
/// transform needs besides the original size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObfuscationMetadata {
    pub algorithm: String,
    /// Base64-encoded 32-byte seed.
    pub seed_b64: String,
    pub block_size: u32,
    pub overhead_pct: f64,
    pub min_gap: u64,
}

/// Per-chunk entry in the key file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: u32,
    pub drive_account_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    pub drive_file_id: String,
    pub filename: String,
    pub start_offset: u64,
    pub end_offset: u64,
    pub size: u64,
    /// Lowercase hex SHA-256 of the chunk blob.
    pub checksum: String,
}

/// The key file emitted to the client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyFile {
    pub version: String,
    pub file_id: FileId,
    pub original_filename: String,
    pub original_size: u64,
    pub processed_size: u64,
    pub obfuscation: ObfuscationMetadata,
    pub chunks: Vec<ChunkMetadata>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl KeyFile {
    /// Assemble a key file for a completed upload.
    pub fn new(
        file_id: FileId,
        original_filename: String,
        original_size: u64,
        processed_size: u64,
        obfuscation: ObfuscationMetadata,
        chunks: Vec<ChunkMetadata>,
    ) -> Self {
        Self {
            version: KEY_FILE_VERSION.to_string(),
            file_id,
            original_filename,
            original_size,
            processed_size,
            obfuscation,
            chunks,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Parse and validate a key file from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let key_file: KeyFile = serde_json::from_slice(data)
            .map_err(|e| Error::KeyFile(format!("failed to parse: {e}")))?;
        key_file.validate()?;
        Ok(key_file)
    }

    /// Check the structural requirements every key file must meet.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(Error::KeyFile("missing version".into()));
        }
        if self.original_filename.is_empty() {
            return Err(Error::KeyFile("missing original filename".into()));
        }
        if self.chunks.is_empty() {
            return Err(Error::KeyFile("no chunks".into()));
        }
        if self.obfuscation.seed_b64.is_empty() {
            return Err(Error::KeyFile("missing obfuscation seed".into()));
        }
        Ok(())
    }

    /// Write the key file as pretty-printed JSON with 0600 permissions.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        let path = path.as_ref();
        fs::write(path, data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// The advertised file name: `{original_filename}_{file_id}.2xpfm.key`.
    pub fn download_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.original_filename,
            self.file_id,
            crate::KEY_FILE_EXTENSION
        )
    }
}
