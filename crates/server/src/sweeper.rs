//! Expired-session sweeper.
//!
//! The store has no TTL index, so a background loop removes sessions past
//! their expiry together with their temp artifacts. Sessions still marked
//! `processing` past expiry are the leftovers of a process restart
//! mid-pipeline; sweeping them keeps the state machine from hanging there
//! forever.

use crate::state::AppState;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Rows removed per sweep pass.
const SWEEP_BATCH: u32 = 100;

/// Spawn the sweeper loop.
pub fn spawn_session_sweeper(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Session sweeper started");
        loop {
            tokio::time::sleep(interval).await;
            if let Err(e) = sweep_once(&state).await {
                tracing::error!(error = %e, "Session sweep failed");
            }
        }
    })
}

/// One sweep pass over upload and download sessions.
pub async fn sweep_once(state: &AppState) -> shardbox_metadata::MetadataResult<()> {
    let now = OffsetDateTime::now_utc();

    let uploads = state
        .metadata
        .get_expired_upload_sessions(now, SWEEP_BATCH)
        .await?;
    for session in uploads {
        remove_if_exists(&session.temp_file_path).await;
        remove_if_exists(&format!("{}.obfuscated", session.temp_file_path)).await;
        if let Some(key_path) = &session.key_file_path {
            remove_if_exists(key_path).await;
        }
        state
            .metadata
            .delete_upload_session(session.session_id)
            .await?;
        tracing::info!(
            session_id = %session.session_id,
            status = %session.status,
            "Swept expired upload session"
        );
    }

    let downloads = state
        .metadata
        .get_expired_download_sessions(now, SWEEP_BATCH)
        .await?;
    for session in downloads {
        remove_if_exists(&session.temp_file_path).await;
        remove_if_exists(&format!("{}_obfuscated", session.temp_file_path)).await;
        if let Some(path) = &session.reconstructed_path {
            remove_if_exists(path).await;
        }
        let chunk_dir = PathBuf::from(format!("{}_chunks", session.temp_file_path));
        if chunk_dir.is_dir() {
            let _ = tokio::fs::remove_dir_all(&chunk_dir).await;
        }
        state
            .metadata
            .delete_download_session(session.session_id)
            .await?;
        tracing::info!(
            session_id = %session.session_id,
            status = %session.status,
            "Swept expired download session"
        );
    }

    Ok(())
}

async fn remove_if_exists(path: impl AsRef<Path>) {
    let _ = tokio::fs::remove_file(path.as_ref()).await;
}
