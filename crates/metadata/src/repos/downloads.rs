//! Download session repository.

use crate::error::MetadataResult;
use crate::models::DownloadSessionRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

#[async_trait]
pub trait DownloadSessionRepo: Send + Sync {
    async fn create_download_session(
        &self,
        session: &DownloadSessionRow,
    ) -> MetadataResult<()>;

    async fn get_download_session(
        &self,
        session_id: Uuid,
    ) -> MetadataResult<Option<DownloadSessionRow>>;

    async fn update_download_status(
        &self,
        session_id: Uuid,
        status: &str,
        progress: f64,
        error_message: Option<&str>,
    ) -> MetadataResult<()>;

    async fn set_reconstructed_path(
        &self,
        session_id: Uuid,
        path: &str,
    ) -> MetadataResult<()>;

    async fn complete_download_session(
        &self,
        session_id: Uuid,
        completed_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    async fn get_expired_download_sessions(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> MetadataResult<Vec<DownloadSessionRow>>;

    async fn delete_download_session(&self, session_id: Uuid) -> MetadataResult<()>;
}
