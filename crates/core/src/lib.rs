//! Core domain types and shared logic for the shardbox split-file store.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Session, file and drive identifiers
//! - The deterministic obfuscation codec and its inverse
//! - The space-aware chunk distribution planner
//! - File splitting and joining along a plan
//! - Key file and per-drive manifest structures
//! - Session lifecycle types

pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod keyfile;
pub mod manifest;
pub mod obfuscate;
pub mod plan;
pub mod session;
pub mod split;

pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use id::{DriveId, FileId, SessionId};
pub use keyfile::{ChunkMetadata, KeyFile, ObfuscationMetadata, KEY_FILE_VERSION};
pub use manifest::{DriveManifest, ManifestChunk, ManifestFile, MANIFEST_FILENAME};
pub use obfuscate::{ObfuscationParams, Seed};
pub use plan::{ChunkPlan, ChunkingStrategy, DriveSpace};
pub use session::{DownloadStatus, StoredFileStatus, UploadStatus};

/// Extension for chunk blobs stored on drives.
pub const CHUNK_EXTENSION: &str = "2xpfm";

/// Extension for emitted key files.
pub const KEY_FILE_EXTENSION: &str = "2xpfm.key";

/// Build the deterministic chunk blob name for a file and chunk id.
pub fn chunk_filename(file_id: &FileId, chunk_id: u32) -> String {
    format!("{file_id}_{chunk_id:02}.{CHUNK_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_filename_is_zero_padded() {
        let file_id = FileId::parse("0123456789abcdef").unwrap();
        assert_eq!(chunk_filename(&file_id, 1), "0123456789abcdef_01.2xpfm");
        assert_eq!(chunk_filename(&file_id, 12), "0123456789abcdef_12.2xpfm");
        assert_eq!(chunk_filename(&file_id, 123), "0123456789abcdef_123.2xpfm");
    }
}
