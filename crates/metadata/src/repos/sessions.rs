//! Upload session repository.

use crate::error::MetadataResult;
use crate::models::UploadSessionRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

#[async_trait]
pub trait UploadSessionRepo: Send + Sync {
    async fn create_upload_session(&self, session: &UploadSessionRow) -> MetadataResult<()>;

    async fn get_upload_session(
        &self,
        session_id: Uuid,
    ) -> MetadataResult<Option<UploadSessionRow>>;

    /// Raise `uploaded_size` to the given value if larger; monotonic under
    /// concurrent chunk requests.
    async fn update_uploaded_size(
        &self,
        session_id: Uuid,
        uploaded_size: i64,
    ) -> MetadataResult<()>;

    /// Set status and processing progress; a Some error message overwrites
    /// the stored one, None leaves it untouched.
    async fn update_upload_status(
        &self,
        session_id: Uuid,
        status: &str,
        progress: f64,
        error_message: Option<&str>,
    ) -> MetadataResult<()>;

    async fn set_key_file_path(&self, session_id: Uuid, path: &str) -> MetadataResult<()>;

    async fn complete_upload_session(
        &self,
        session_id: Uuid,
        completed_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Sessions of the user counting against the concurrency cap
    /// (status ∈ {uploading, processing}).
    async fn count_active_sessions(&self, user_id: Uuid) -> MetadataResult<u64>;

    /// Sessions past their expiry, regardless of status.
    async fn get_expired_upload_sessions(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> MetadataResult<Vec<UploadSessionRow>>;

    async fn delete_upload_session(&self, session_id: Uuid) -> MetadataResult<()>;
}
