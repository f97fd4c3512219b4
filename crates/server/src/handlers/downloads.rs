//! Stored-file listing, download orchestration and deletion.
//!
//! Download is the mirror of the upload pipeline: validate the submitted
//! key file against the stored-file record, fetch chunks with bounded
//! parallelism, verify checksums, join, de-obfuscate and serve.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use shardbox_core::keyfile::KeyFile;
use shardbox_core::{ContentHash, DownloadStatus, SessionId};
use shardbox_metadata::models::{DownloadSessionRow, DriveAccountRow, StoredChunkRow};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

/// GET /api/files/list - the user's stored files, without chunk details.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let files = state.metadata.list_stored_files(user.user_id).await?;
    let listed: Vec<serde_json::Value> = files
        .into_iter()
        .map(|f| {
            serde_json::json!({
                "file_id": f.file_id,
                "original_filename": f.original_filename,
                "original_size": f.original_size,
                "processed_size": f.processed_size,
                "num_chunks": f.num_chunks,
                "status": f.status,
                "created_at": f
                    .created_at
                    .format(&time::format_description::well_known::Rfc3339)
                    .ok(),
            })
        })
        .collect();
    Ok(Json(serde_json::Value::Array(listed)))
}

/// Which of the user's linked drives can satisfy a chunk, by logical drive
/// id or account id.
struct LinkedDrives {
    drive_ids: HashSet<String>,
    account_ids: HashSet<Uuid>,
}

impl LinkedDrives {
    fn from_accounts(accounts: &[DriveAccountRow]) -> Self {
        Self {
            drive_ids: accounts
                .iter()
                .filter_map(|a| a.drive_id.clone())
                .collect(),
            account_ids: accounts.iter().map(|a| a.account_id).collect(),
        }
    }

    fn covers(&self, chunk: &StoredChunkRow) -> bool {
        chunk
            .drive_id
            .as_ref()
            .is_some_and(|id| self.drive_ids.contains(id))
            || self.account_ids.contains(&chunk.drive_account_id)
    }
}

/// POST /api/files/download/initiate - submit a key file, start the
/// reconstruction pipeline.
#[tracing::instrument(skip(state, multipart), fields(user_id = %user.user_id))]
pub async fn initiate_download(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let mut key_file_data: Option<bytes::Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to parse form: {e}")))?
    {
        if field.name() == Some("key_file") {
            key_file_data = Some(field.bytes().await.map_err(|e| {
                ApiError::BadRequest(format!("failed to read key file: {e}"))
            })?);
        }
    }
    let key_file_data =
        key_file_data.ok_or_else(|| ApiError::BadRequest("key_file required".to_string()))?;

    let key = KeyFile::from_json(&key_file_data)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (stored, chunks) = state
        .metadata
        .get_stored_file(user.user_id, key.file_id.as_str())
        .await?
        .ok_or_else(|| ApiError::NotFound("file not found".to_string()))?;

    // 401 on seed mismatch so probing with forged key files does not
    // confirm which file ids exist.
    if stored.obfuscation_seed != key.obfuscation.seed_b64 {
        tracing::warn!(file_id = %stored.file_id, "Obfuscation seed mismatch");
        return Err(ApiError::Unauthorized(
            "invalid key file: obfuscation seed mismatch".to_string(),
        ));
    }

    match stored.status.as_str() {
        "active" => {}
        "incomplete" => {
            return Err(ApiError::BadRequest(
                "file incomplete: some drives may be unlinked".to_string(),
            ));
        }
        _ => return Err(ApiError::NotFound("file has been deleted".to_string())),
    }

    // Every referenced drive must still be linked before any work starts.
    let accounts = state.metadata.list_drive_accounts(user.user_id).await?;
    let linked = LinkedDrives::from_accounts(&accounts);
    for chunk in &chunks {
        if !linked.covers(chunk) {
            return Err(ApiError::BadRequest(format!(
                "drive not available for chunk {}",
                chunk.chunk_id
            )));
        }
    }

    tokio::fs::create_dir_all(&state.config.download.temp_dir).await?;
    let session_id = SessionId::new();
    let now = OffsetDateTime::now_utc();
    let session = DownloadSessionRow {
        session_id: *session_id.as_uuid(),
        user_id: user.user_id,
        file_id: stored.file_id.clone(),
        original_filename: stored.original_filename.clone(),
        status: DownloadStatus::Downloading.as_str().to_string(),
        progress: 0.0,
        error_message: None,
        temp_file_path: state
            .config
            .download
            .temp_dir
            .join(format!("{}_{}", user.user_id, stored.file_id))
            .to_string_lossy()
            .to_string(),
        reconstructed_path: None,
        created_at: now,
        expires_at: now + state.config.download.session_expiry(),
        completed_at: None,
    };
    state.metadata.create_download_session(&session).await?;

    tracing::info!(session_id = %session_id, file_id = %stored.file_id, "Download session created");
    tokio::spawn(run_download_pipeline(state.clone(), session, chunks, key));

    Ok(Json(serde_json::json!({
        "message": "download started",
        "session_id": session_id.to_string(),
        "status_url": format!("/api/files/download/status/{session_id}"),
    })))
}

/// GET /api/files/download/status/{session_id}.
pub async fn download_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AxumPath(session_id): AxumPath<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let session = get_owned_download_session(&state, &session_id, user.user_id).await?;

    Ok(Json(serde_json::json!({
        "status": session.status,
        "progress": session.progress,
        "error_message": session.error_message,
        "completed_at": session
            .completed_at
            .and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok()),
    })))
}

/// GET /api/files/download/file/{session_id} - stream the reconstructed
/// file. Temp artifacts are scheduled for deletion after a delay.
pub async fn download_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AxumPath(session_id): AxumPath<String>,
) -> ApiResult<Response> {
    let session = get_owned_download_session(&state, &session_id, user.user_id).await?;

    if session.status != DownloadStatus::Complete.as_str() {
        return Err(ApiError::BadRequest("download not complete".to_string()));
    }

    let reconstructed_path = session
        .reconstructed_path
        .clone()
        .unwrap_or_else(|| format!("{}_reconstructed", session.temp_file_path));

    let file = tokio::fs::File::open(&reconstructed_path)
        .await
        .map_err(|_| ApiError::NotFound("file not found".to_string()))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to stat file: {e}")))?
        .len();

    // Both temp artifacts go away after the cleanup delay.
    schedule_download_cleanup(
        state.clone(),
        vec![
            PathBuf::from(&reconstructed_path),
            PathBuf::from(&session.temp_file_path),
        ],
    );

    let stream = tokio_util::io::ReaderStream::new(file);
    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "application/octet-stream".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", session.original_filename),
            ),
            (header::CONTENT_LENGTH, size.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// GET /api/files/verify/{file_id} - per-chunk drive availability report.
pub async fn verify_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AxumPath(file_id): AxumPath<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let (stored, chunks) = state
        .metadata
        .get_stored_file(user.user_id, &file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("file not found".to_string()))?;

    let accounts = state.metadata.list_drive_accounts(user.user_id).await?;
    let linked = LinkedDrives::from_accounts(&accounts);

    let missing_chunks: Vec<i64> = chunks
        .iter()
        .filter(|c| !linked.covers(c))
        .map(|c| c.chunk_id)
        .collect();

    Ok(Json(serde_json::json!({
        "file_id": file_id,
        "status": stored.status,
        "chunks_total": chunks.len(),
        "missing_chunks": missing_chunks,
        "is_complete": missing_chunks.is_empty(),
    })))
}

/// DELETE /api/files/{file_id} - best-effort sweep of the file's chunks
/// across drives, then mark the record deleted.
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AxumPath(file_id): AxumPath<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let (_, chunks) = state
        .metadata
        .get_stored_file(user.user_id, &file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("file not found".to_string()))?;

    for chunk in &chunks {
        if let Err(e) = state
            .drive
            .delete(chunk.drive_account_id, &chunk.drive_file_id)
            .await
        {
            tracing::warn!(
                file_id = %file_id,
                chunk_id = chunk.chunk_id,
                error = %e,
                "Failed to delete chunk from drive"
            );
        }
    }

    state
        .metadata
        .update_stored_file_status(user.user_id, &file_id, "deleted")
        .await?;

    tracing::info!(file_id = %file_id, "Stored file deleted");
    Ok(Json(serde_json::json!({
        "message": "file deleted successfully"
    })))
}

async fn get_owned_download_session(
    state: &AppState,
    raw_session_id: &str,
    user_id: Uuid,
) -> ApiResult<DownloadSessionRow> {
    let session_id = SessionId::parse(raw_session_id)
        .map_err(|_| ApiError::BadRequest("invalid session_id".to_string()))?;
    let session = state
        .metadata
        .get_download_session(*session_id.as_uuid())
        .await?
        .ok_or_else(|| ApiError::NotFound("session not found".to_string()))?;
    if session.user_id != user_id {
        return Err(ApiError::Unauthorized("unauthorized".to_string()));
    }
    Ok(session)
}

fn schedule_download_cleanup(state: AppState, paths: Vec<PathBuf>) {
    let delay = state.config.upload.temp_file_cleanup();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for path in paths {
            let _ = tokio::fs::remove_file(&path).await;
        }
    });
}

// ===== Background pipeline =====

/// Fetch, verify, join and de-obfuscate one stored file.
pub async fn run_download_pipeline(
    state: AppState,
    session: DownloadSessionRow,
    chunks: Vec<StoredChunkRow>,
    key: KeyFile,
) {
    let session_id = session.session_id;
    let chunk_dir = PathBuf::from(format!("{}_chunks", session.temp_file_path));
    let obfuscated_path = PathBuf::from(format!("{}_obfuscated", session.temp_file_path));

    if let Err((progress, message)) =
        execute_download(&state, &session, &chunks, &key, &chunk_dir, &obfuscated_path).await
    {
        tracing::error!(
            session_id = %session_id,
            error = %message,
            "Download pipeline failed"
        );
        let _ = state
            .metadata
            .update_download_status(
                session_id,
                DownloadStatus::Failed.as_str(),
                progress,
                Some(&message),
            )
            .await;
    }

    // Intermediates are spent either way; the reconstructed file lives on
    // until the serve endpoint schedules its removal.
    let _ = tokio::fs::remove_dir_all(&chunk_dir).await;
    let _ = tokio::fs::remove_file(&obfuscated_path).await;
}

async fn execute_download(
    state: &AppState,
    session: &DownloadSessionRow,
    chunks: &[StoredChunkRow],
    key: &KeyFile,
    chunk_dir: &PathBuf,
    obfuscated_path: &PathBuf,
) -> Result<(), (f64, String)> {
    let session_id = session.session_id;

    // Step 1: fetch chunks in parallel, bounded by the configured limit
    // (default 1 = serial). Progress scales 5 → 60.
    let _ = state
        .metadata
        .update_download_status(session_id, DownloadStatus::Downloading.as_str(), 5.0, None)
        .await;
    tokio::fs::create_dir_all(chunk_dir)
        .await
        .map_err(|e| (5.0, format!("download failed: {e}")))?;

    let total = chunks.len();
    let semaphore = Arc::new(Semaphore::new(
        state.config.download.max_parallel_downloads.max(1),
    ));
    let done = Arc::new(AtomicUsize::new(0));
    let mut tasks: JoinSet<Result<(), String>> = JoinSet::new();

    for chunk in chunks.iter().cloned() {
        let state = state.clone();
        let semaphore = semaphore.clone();
        let done = done.clone();
        let out_path = chunk_dir.join(&chunk.filename);

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            state
                .drive
                .download(chunk.drive_account_id, &chunk.drive_file_id, &out_path)
                .await
                .map_err(|e| format!("failed to download chunk {}: {e}", chunk.chunk_id))?;

            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            let progress = 5.0 + 55.0 * finished as f64 / total as f64;
            let _ = state
                .metadata
                .update_download_status(
                    session_id,
                    DownloadStatus::Downloading.as_str(),
                    progress,
                    None,
                )
                .await;
            Ok(())
        });
    }

    let mut first_error: Option<String> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                first_error.get_or_insert(message);
            }
            Err(e) => {
                first_error.get_or_insert(format!("download task failed: {e}"));
            }
        }
    }
    if let Some(message) = first_error {
        return Err((60.0, format!("download failed: {message}")));
    }

    // Step 2: verify checksums.
    let _ = state
        .metadata
        .update_download_status(session_id, DownloadStatus::Downloading.as_str(), 60.0, None)
        .await;
    for chunk in chunks {
        let path = chunk_dir.join(&chunk.filename);
        let checksum = tokio::task::spawn_blocking(move || ContentHash::compute_file(&path))
            .await
            .map_err(|e| (60.0, format!("checksum calculation failed: {e}")))?
            .map_err(|e| (60.0, format!("checksum calculation failed: {e}")))?
            .to_hex();
        if checksum != chunk.checksum {
            return Err((60.0, format!("checksum mismatch for chunk {}", chunk.chunk_id)));
        }
    }

    // Step 3: join in chunk-id order.
    let _ = state
        .metadata
        .update_download_status(session_id, DownloadStatus::Decrypting.as_str(), 65.0, None)
        .await;
    let join_inputs: Vec<(PathBuf, u64)> = chunks
        .iter()
        .map(|c| (chunk_dir.join(&c.filename), c.size_bytes as u64))
        .collect();
    {
        let output = obfuscated_path.clone();
        tokio::task::spawn_blocking(move || shardbox_core::split::join_chunks(&join_inputs, &output))
            .await
            .map_err(|e| (65.0, format!("reconstruction failed: {e}")))?
            .map_err(|e| (65.0, format!("reconstruction failed: {e}")))?;
    }

    // Step 4: invert the obfuscation.
    let _ = state
        .metadata
        .update_download_status(session_id, DownloadStatus::Decrypting.as_str(), 75.0, None)
        .await;
    let reconstructed_path = format!("{}_reconstructed", session.temp_file_path);
    {
        let input = obfuscated_path.clone();
        let output = PathBuf::from(&reconstructed_path);
        let metadata = key.obfuscation.clone();
        let original_size = key.original_size;
        tokio::task::spawn_blocking(move || {
            shardbox_core::obfuscate::deobfuscate_file(&input, &output, &metadata, original_size)
        })
        .await
        .map_err(|e| (75.0, format!("deobfuscation failed: {e}")))?
        .map_err(|e| (75.0, format!("deobfuscation failed: {e}")))?;
    }

    // Step 5: publish and complete.
    let _ = state
        .metadata
        .update_download_status(session_id, DownloadStatus::Decrypting.as_str(), 95.0, None)
        .await;
    state
        .metadata
        .set_reconstructed_path(session_id, &reconstructed_path)
        .await
        .map_err(|e| (95.0, format!("failed to record reconstructed path: {e}")))?;
    state
        .metadata
        .complete_download_session(session_id, OffsetDateTime::now_utc())
        .await
        .map_err(|e| (95.0, format!("failed to complete session: {e}")))?;

    tracing::info!(session_id = %session_id, "Download pipeline complete");
    Ok(())
}
