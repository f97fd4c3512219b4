//! Database row types.
//!
//! Rows mirror the persisted schema; domain-level enums are stored as their
//! lowercase string form and parsed at the edges.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A registered user.
#[derive(Clone, Debug, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// One linked cloud-storage account.
#[derive(Clone, Debug, FromRow)]
pub struct DriveAccountRow {
    pub account_id: Uuid,
    pub user_id: Uuid,
    /// Provider tag, currently always "google".
    pub provider: String,
    pub display_name: String,
    /// AES-256-GCM sealed provider token JSON (nonce ‖ ciphertext).
    pub encrypted_token: Vec<u8>,
    /// Logical drive id; allocated on first manifest use.
    pub drive_id: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Pending OAuth link state, consumed once by the callback.
#[derive(Clone, Debug, FromRow)]
pub struct OAuthStateRow {
    pub state: String,
    pub user_id: Uuid,
    pub provider: String,
    pub created_at: OffsetDateTime,
}

/// An upload session and its ingest/pipeline progress.
#[derive(Clone, Debug, FromRow)]
pub struct UploadSessionRow {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub file_id: String,
    pub original_filename: String,
    pub temp_file_path: String,
    pub total_size: i64,
    pub uploaded_size: i64,
    /// One of uploading | processing | complete | failed.
    pub status: String,
    pub processing_progress: f64,
    pub error_message: Option<String>,
    pub key_file_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

/// A download session.
#[derive(Clone, Debug, FromRow)]
pub struct DownloadSessionRow {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub file_id: String,
    pub original_filename: String,
    /// One of downloading | decrypting | complete | failed.
    pub status: String,
    pub progress: f64,
    pub error_message: Option<String>,
    pub temp_file_path: String,
    pub reconstructed_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

/// A durably stored (split) file.
#[derive(Clone, Debug, FromRow)]
pub struct StoredFileRow {
    pub file_id: String,
    pub user_id: Uuid,
    pub original_filename: String,
    pub original_size: i64,
    pub processed_size: i64,
    /// Base64 seed, compared against submitted key files.
    pub obfuscation_seed: String,
    /// One of active | incomplete | deleted.
    pub status: String,
    pub created_at: OffsetDateTime,
}

/// One chunk of a stored file.
#[derive(Clone, Debug, FromRow)]
pub struct StoredChunkRow {
    pub user_id: Uuid,
    pub file_id: String,
    pub chunk_id: i64,
    pub drive_account_id: Uuid,
    pub drive_id: Option<String>,
    pub drive_file_id: String,
    pub filename: String,
    pub size_bytes: i64,
    /// Lowercase hex SHA-256.
    pub checksum: String,
    pub start_offset: i64,
    pub end_offset: i64,
}

/// Stored-file listing entry with its chunk count.
#[derive(Clone, Debug, FromRow)]
pub struct StoredFileSummaryRow {
    pub file_id: String,
    pub user_id: Uuid,
    pub original_filename: String,
    pub original_size: i64,
    pub processed_size: i64,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub num_chunks: i64,
}
