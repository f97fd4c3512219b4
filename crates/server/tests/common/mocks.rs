//! In-memory drive gateway for server tests.

use async_trait::async_trait;
use shardbox_drive::{DriveError, DriveGateway, DriveQuota};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// One stored blob.
#[derive(Clone, Debug)]
pub struct MockBlob {
    pub account_id: Uuid,
    pub name: String,
    pub content: Vec<u8>,
}

/// In-memory drive backend.
///
/// Records uploads and deletions so tests can assert on rollback behavior,
/// and can be told to fail the Nth upload call with a provider error.
#[derive(Default)]
pub struct MockDrive {
    pub blobs: Mutex<HashMap<String, MockBlob>>,
    pub quotas: Mutex<HashMap<Uuid, DriveQuota>>,
    pub deleted: Mutex<Vec<String>>,
    next_id: AtomicU64,
    upload_calls: AtomicU32,
    /// 1-based index of the upload call to fail; 0 disables.
    pub fail_upload_call: AtomicU32,
}

impl MockDrive {
    pub fn set_quota(&self, account_id: Uuid, limit: i64, usage: i64) {
        self.quotas.lock().unwrap().insert(
            account_id,
            DriveQuota {
                owner_name: Some("Mock Owner".to_string()),
                owner_email: Some("owner@example.com".to_string()),
                limit,
                usage,
            },
        );
    }

    /// Fail the Nth upload (1-based) with a 403.
    pub fn fail_upload_at(&self, call: u32) {
        self.fail_upload_call.store(call, Ordering::SeqCst);
    }

    pub fn blob_by_name(&self, name: &str) -> Option<(String, MockBlob)> {
        self.blobs
            .lock()
            .unwrap()
            .iter()
            .find(|(_, b)| b.name == name)
            .map(|(id, b)| (id.clone(), b.clone()))
    }

    pub fn tamper_blob(&self, drive_file_id: &str, content: Vec<u8>) {
        if let Some(blob) = self.blobs.lock().unwrap().get_mut(drive_file_id) {
            blob.content = content;
        }
    }

    fn store(&self, account_id: Uuid, name: &str, content: Vec<u8>) -> String {
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.blobs.lock().unwrap().insert(
            id.clone(),
            MockBlob {
                account_id,
                name: name.to_string(),
                content,
            },
        );
        id
    }
}

#[async_trait]
impl DriveGateway for MockDrive {
    async fn upload(
        &self,
        account_id: Uuid,
        path: &Path,
        name: &str,
    ) -> Result<String, DriveError> {
        let call = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_upload_call.load(Ordering::SeqCst) {
            return Err(DriveError::Provider {
                status: 403,
                body: "quota exceeded".to_string(),
            });
        }
        let content = std::fs::read(path)?;
        Ok(self.store(account_id, name, content))
    }

    async fn upload_bytes(
        &self,
        account_id: Uuid,
        name: &str,
        content: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, DriveError> {
        Ok(self.store(account_id, name, content))
    }

    async fn read(&self, _account_id: Uuid, drive_file_id: &str) -> Result<Vec<u8>, DriveError> {
        self.blobs
            .lock()
            .unwrap()
            .get(drive_file_id)
            .map(|b| b.content.clone())
            .ok_or_else(|| DriveError::NotFound(format!("blob {drive_file_id} not found")))
    }

    async fn update(
        &self,
        _account_id: Uuid,
        drive_file_id: &str,
        content: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), DriveError> {
        let mut blobs = self.blobs.lock().unwrap();
        let blob = blobs
            .get_mut(drive_file_id)
            .ok_or_else(|| DriveError::NotFound(format!("blob {drive_file_id} not found")))?;
        blob.content = content;
        Ok(())
    }

    async fn download(
        &self,
        _account_id: Uuid,
        drive_file_id: &str,
        out_path: &Path,
    ) -> Result<(), DriveError> {
        let content = self
            .blobs
            .lock()
            .unwrap()
            .get(drive_file_id)
            .map(|b| b.content.clone())
            .ok_or_else(|| DriveError::NotFound(format!("blob {drive_file_id} not found")))?;
        std::fs::write(out_path, content)?;
        Ok(())
    }

    async fn delete(&self, _account_id: Uuid, drive_file_id: &str) -> Result<(), DriveError> {
        self.blobs.lock().unwrap().remove(drive_file_id);
        self.deleted.lock().unwrap().push(drive_file_id.to_string());
        Ok(())
    }

    async fn query_space(&self, account_id: Uuid) -> Result<DriveQuota, DriveError> {
        self.quotas
            .lock()
            .unwrap()
            .get(&account_id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(format!("no quota for account {account_id}")))
    }

    async fn find(&self, account_id: Uuid, name: &str) -> Result<Option<String>, DriveError> {
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .iter()
            .find(|(_, b)| b.account_id == account_id && b.name == name)
            .map(|(id, _)| id.clone()))
    }
}
