//! Stored-file catalogue repository.

use crate::error::MetadataResult;
use crate::models::{StoredChunkRow, StoredFileRow, StoredFileSummaryRow};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait StoredFileRepo: Send + Sync {
    /// Insert a stored file and its chunk rows in one transaction.
    async fn create_stored_file(
        &self,
        file: &StoredFileRow,
        chunks: &[StoredChunkRow],
    ) -> MetadataResult<()>;

    /// Fetch a stored file and its chunks in chunk-id order.
    async fn get_stored_file(
        &self,
        user_id: Uuid,
        file_id: &str,
    ) -> MetadataResult<Option<(StoredFileRow, Vec<StoredChunkRow>)>>;

    /// Active and incomplete files of a user, newest first.
    async fn list_stored_files(
        &self,
        user_id: Uuid,
    ) -> MetadataResult<Vec<StoredFileSummaryRow>>;

    async fn update_stored_file_status(
        &self,
        user_id: Uuid,
        file_id: &str,
        status: &str,
    ) -> MetadataResult<()>;

    /// Flip active files with chunks on the given drive to 'incomplete'.
    /// Returns the number of affected files. Called when a user unlinks a
    /// drive.
    async fn mark_files_incomplete_for_drive(
        &self,
        user_id: Uuid,
        drive_id: &str,
    ) -> MetadataResult<u64>;

    /// Active files with chunks on the given drive.
    async fn get_files_for_drive(
        &self,
        user_id: Uuid,
        drive_id: &str,
    ) -> MetadataResult<Vec<StoredFileRow>>;
}
