//! Per-drive manifest structure.
//!
//! Each drive hosts one well-known blob listing every chunk this system has
//! placed on it. The manifest is a convenience index; the stored-file record
//! in the database stays authoritative.

use crate::DriveId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Well-known manifest blob name on every drive.
pub const MANIFEST_FILENAME: &str = "2xpfm.manifest";

/// One chunk of a file as recorded on its hosting drive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestChunk {
    pub chunk_id: u32,
    pub filename: String,
    pub drive_file_id: String,
    pub size: u64,
    pub checksum: String,
}

/// One file entry; contains only the chunks residing on this drive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub file_id: String,
    pub original_filename: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    pub chunks: Vec<ManifestChunk>,
}

/// The manifest blob, one per drive.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriveManifest {
    /// Logical drive identifier. Legacy manifests may lack it; the keeper
    /// back-fills those in place.
    #[serde(default)]
    pub drive_id: Option<DriveId>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub files: Vec<ManifestFile>,
}

impl DriveManifest {
    /// Create an empty manifest for a freshly allocated drive id.
    pub fn new(drive_id: DriveId) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            drive_id: Some(drive_id),
            created_at: now,
            updated_at: now,
            files: Vec::new(),
        }
    }

    /// Append or merge a file entry.
    ///
    /// If an entry with the same file_id already exists its chunks are
    /// appended instead of duplicating the file; otherwise the entry is
    /// added. `updated_at` is bumped either way.
    pub fn merge_file(&mut self, entry: ManifestFile) {
        match self.files.iter_mut().find(|f| f.file_id == entry.file_id) {
            Some(existing) => existing.chunks.extend(entry.chunks),
            None => self.files.push(entry),
        }
        self.updated_at = OffsetDateTime::now_utc();
    }
}
