//! Per-drive manifest keeper.
//!
//! Each drive hosts one well-known `2xpfm.manifest` blob. The keeper
//! creates it on first use (allocating the drive's 16-character logical id
//! and persisting it back to the account record), back-fills legacy
//! manifests that predate drive ids, and applies append-or-merge file
//! updates with a short retry. The stored-file DB record remains the
//! authoritative map from files to drive file ids; the manifest is a
//! convenience index, so write failures are surfaced for logging but never
//! fail the enclosing upload.

use crate::error::{DriveError, DriveResult};
use crate::gateway::DriveGateway;
use shardbox_core::manifest::{DriveManifest, ManifestFile, MANIFEST_FILENAME};
use shardbox_core::DriveId;
use shardbox_metadata::MetadataStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Manifest write attempts before giving up.
const WRITE_ATTEMPTS: u32 = 3;

pub struct ManifestKeeper {
    gateway: Arc<dyn DriveGateway>,
    metadata: Arc<dyn MetadataStore>,
}

impl ManifestKeeper {
    pub fn new(gateway: Arc<dyn DriveGateway>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { gateway, metadata }
    }

    /// Fetch the drive's manifest, creating it if absent.
    ///
    /// Returns the manifest and its provider file id. On first use a fresh
    /// drive id is allocated and persisted to the account record; legacy
    /// manifests without a drive id are back-filled in place.
    pub async fn get_or_create(
        &self,
        account_id: Uuid,
    ) -> DriveResult<(DriveManifest, String)> {
        let account = self
            .metadata
            .get_drive_account(account_id)
            .await?
            .ok_or_else(|| DriveError::NotFound(format!("drive account {account_id} not found")))?;

        let account_drive_id = account
            .drive_id
            .as_deref()
            .and_then(|s| DriveId::parse(s).ok());

        if let Some(manifest_file_id) = self.gateway.find(account_id, MANIFEST_FILENAME).await? {
            let raw = self.gateway.read(account_id, &manifest_file_id).await?;
            let mut manifest: DriveManifest = serde_json::from_slice(&raw)
                .map_err(|e| DriveError::Manifest(format!("failed to parse manifest: {e}")))?;

            if manifest.drive_id.is_none() {
                // Legacy manifest: back-fill the drive id in place.
                let drive_id = account_drive_id.clone().unwrap_or_default();
                manifest.drive_id = Some(drive_id.clone());
                self.write_manifest(account_id, &manifest_file_id, &manifest)
                    .await?;

                if account_drive_id.is_none() {
                    self.metadata
                        .set_account_drive_id(account_id, drive_id.as_str())
                        .await?;
                }
                tracing::info!(
                    account_id = %account_id,
                    drive_id = %drive_id,
                    "Back-filled legacy manifest drive id"
                );
            }

            return Ok((manifest, manifest_file_id));
        }

        // No manifest yet: create one under a fresh (or persisted) drive id.
        let drive_id = account_drive_id.clone().unwrap_or_default();
        let manifest = DriveManifest::new(drive_id.clone());

        let raw = serde_json::to_vec_pretty(&manifest)?;
        let manifest_file_id = self
            .gateway
            .upload_bytes(account_id, MANIFEST_FILENAME, raw, "application/json")
            .await?;

        if account_drive_id.is_none() {
            self.metadata
                .set_account_drive_id(account_id, drive_id.as_str())
                .await?;
        }

        tracing::info!(
            account_id = %account_id,
            drive_id = %drive_id,
            "Created drive manifest"
        );
        Ok((manifest, manifest_file_id))
    }

    /// Merge a file entry into the drive's manifest and write it back.
    ///
    /// The write is retried up to 3 times with linear backoff (1 s, 2 s).
    pub async fn add_file(
        &self,
        account_id: Uuid,
        manifest_file_id: &str,
        entry: ManifestFile,
    ) -> DriveResult<()> {
        let (mut manifest, _) = self.get_or_create(account_id).await?;
        manifest.merge_file(entry);

        let mut last_error = None;
        for attempt in 1..=WRITE_ATTEMPTS {
            match self
                .write_manifest(account_id, manifest_file_id, &manifest)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        account_id = %account_id,
                        attempt,
                        error = %e,
                        "Manifest write failed"
                    );
                    last_error = Some(e);
                    if attempt < WRITE_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(DriveError::Manifest(format!(
            "failed to update manifest after {WRITE_ATTEMPTS} attempts: {}",
            last_error.expect("at least one attempt failed")
        )))
    }

    async fn write_manifest(
        &self,
        account_id: Uuid,
        manifest_file_id: &str,
        manifest: &DriveManifest,
    ) -> DriveResult<()> {
        let raw = serde_json::to_vec_pretty(manifest)?;
        self.gateway
            .update(account_id, manifest_file_id, raw, "application/json")
            .await
    }
}
