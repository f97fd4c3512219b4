//! Upload control plane and processing pipeline.
//!
//! The ingest is resumable: the client initiates a session, streams
//! offset-tagged chunks into a single temp file in any order, then
//! finalizes with a strategy choice. Finalize flips the session to
//! `processing` synchronously and runs the pipeline as a detached
//! background task: obfuscate → plan → split → per-drive upload with
//! manifest updates → stored-file record → key file → `complete`.

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Multipart, Path as AxumPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use shardbox_core::keyfile::{ChunkMetadata, KeyFile};
use shardbox_core::manifest::{ManifestChunk, ManifestFile};
use shardbox_core::obfuscate::Seed;
use shardbox_core::plan::{calculate_plan, ChunkPlan, ChunkingStrategy};
use shardbox_core::{chunk_filename, ContentHash, FileId, SessionId, UploadStatus};
use shardbox_metadata::models::{StoredChunkRow, StoredFileRow, UploadSessionRow};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct InitiateUploadRequest {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub file_size: i64,
}

/// POST /api/files/upload/initiate - open a resumable upload session.
#[tracing::instrument(skip(state, req), fields(user_id = %user.user_id))]
pub async fn initiate_upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<InitiateUploadRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let filename = sanitize_filename(&req.filename);
    if filename.is_empty() || req.file_size <= 0 {
        return Err(ApiError::BadRequest(
            "filename and file_size are required".to_string(),
        ));
    }

    let max_bytes = state.config.upload.max_file_size_bytes();
    if req.file_size as u64 > max_bytes {
        return Err(ApiError::BadRequest(format!(
            "file size {} exceeds maximum allowed {} bytes",
            req.file_size, max_bytes
        )));
    }

    let active = state.metadata.count_active_sessions(user.user_id).await?;
    let cap = state.config.upload.max_concurrent_per_user;
    if active >= cap {
        // Kept on the 500 path for client compatibility.
        return Err(ApiError::Internal(format!(
            "maximum concurrent uploads ({cap}) reached"
        )));
    }

    let session_id = SessionId::new();
    let file_id = FileId::new();

    tokio::fs::create_dir_all(&state.config.upload.temp_dir).await?;
    let temp_file_path = state
        .config
        .upload
        .temp_dir
        .join(format!("{session_id}_{filename}"));

    let now = OffsetDateTime::now_utc();
    let session = UploadSessionRow {
        session_id: *session_id.as_uuid(),
        user_id: user.user_id,
        file_id: file_id.to_string(),
        original_filename: filename,
        temp_file_path: temp_file_path.to_string_lossy().to_string(),
        total_size: req.file_size,
        uploaded_size: 0,
        status: UploadStatus::Uploading.as_str().to_string(),
        processing_progress: 0.0,
        error_message: None,
        key_file_path: None,
        created_at: now,
        expires_at: now + state.config.upload.session_expiry(),
        completed_at: None,
    };
    state.metadata.create_upload_session(&session).await?;

    let drive_spaces =
        shardbox_drive::list_drive_spaces(state.drive.as_ref(), state.metadata.as_ref(), user.user_id)
            .await?;

    tracing::info!(session_id = %session_id, file_id = %file_id, "Upload session created");
    Ok(Json(serde_json::json!({
        "session_id": session_id.to_string(),
        "file_id": file_id.to_string(),
        "upload_url": format!("/api/files/upload/chunk?session_id={session_id}"),
        "drive_spaces": drive_spaces,
        "max_file_size": max_bytes,
    })))
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(raw: &str) -> String {
    Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct ChunkQuery {
    #[serde(default)]
    pub session_id: String,
}

/// POST /api/files/upload/chunk?session_id=… - write one offset-tagged
/// chunk into the session temp file.
///
/// Clients may send non-contiguous ranges; contiguity is not verified until
/// finalize. Overlapping ranges with distinct contents are a client error.
pub async fn upload_chunk(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ChunkQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    if query.session_id.is_empty() {
        return Err(ApiError::BadRequest("session_id required".to_string()));
    }
    let session_id = parse_session_id(&query.session_id)?;
    let session = get_owned_session(&state, session_id, user.user_id).await?;

    if session.expires_at <= OffsetDateTime::now_utc() {
        return Err(ApiError::BadRequest("session expired".to_string()));
    }
    if session.status != UploadStatus::Uploading.as_str() {
        return Err(ApiError::BadRequest(format!(
            "session is not accepting chunks (status: {})",
            session.status
        )));
    }

    let mut offset: Option<i64> = None;
    let mut chunk: Option<bytes::Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to parse form: {e}")))?
    {
        match field.name() {
            Some("offset") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("invalid offset field: {e}")))?;
                offset = Some(
                    text.parse()
                        .map_err(|_| ApiError::BadRequest("invalid offset".to_string()))?,
                );
            }
            Some("chunk") => {
                chunk = Some(field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("failed to read chunk field: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let offset = offset.ok_or_else(|| ApiError::BadRequest("offset required".to_string()))?;
    let chunk = chunk.ok_or_else(|| ApiError::BadRequest("chunk file required".to_string()))?;
    if offset < 0 {
        return Err(ApiError::BadRequest("invalid offset".to_string()));
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&session.temp_file_path)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to open temp file: {e}")))?;
    file.seek(std::io::SeekFrom::Start(offset as u64))
        .await
        .map_err(|e| ApiError::Internal(format!("failed to seek temp file: {e}")))?;
    file.write_all(&chunk)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to write chunk: {e}")))?;
    file.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to flush chunk: {e}")))?;

    let highest = offset + chunk.len() as i64;
    state
        .metadata
        .update_uploaded_size(session_id, highest)
        .await?;

    // Re-read for the monotonic figure; another chunk may have raced ahead.
    let uploaded = state
        .metadata
        .get_upload_session(session_id)
        .await?
        .map(|s| s.uploaded_size)
        .unwrap_or(highest);

    Ok(Json(serde_json::json!({
        "uploaded": uploaded,
        "total": session.total_size,
        "progress": uploaded as f64 / session.total_size as f64 * 100.0,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CalculateChunkingRequest {
    #[serde(default)]
    pub file_size: u64,
    pub strategy: ChunkingStrategy,
    #[serde(default)]
    pub manual_chunk_sizes: Option<Vec<u64>>,
}

/// POST /api/files/chunking/calculate - dry-run the planner.
pub async fn calculate_chunking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<CalculateChunkingRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let spaces =
        shardbox_drive::list_drive_spaces(state.drive.as_ref(), state.metadata.as_ref(), user.user_id)
            .await?;

    let plan = calculate_plan(
        req.file_size,
        &spaces,
        req.strategy,
        req.manual_chunk_sizes.as_deref(),
    )?;

    Ok(Json(serde_json::json!({
        "plan": plan,
        "num_chunks": plan.len(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct FinalizeUploadRequest {
    #[serde(default)]
    pub session_id: String,
    pub strategy: ChunkingStrategy,
    #[serde(default)]
    pub manual_chunk_sizes: Option<Vec<u64>>,
}

/// POST /api/files/upload/finalize - close the ingest and start the
/// background pipeline.
#[tracing::instrument(skip(state, req), fields(user_id = %user.user_id))]
pub async fn finalize_upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<FinalizeUploadRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let session_id = parse_session_id(&req.session_id)?;
    let session = get_owned_session(&state, session_id, user.user_id).await?;

    match session.status.as_str() {
        "uploading" => {}
        "processing" => {
            return Err(ApiError::BadRequest("already processing".to_string()));
        }
        "complete" => {
            return Err(ApiError::BadRequest("already complete".to_string()));
        }
        other => {
            return Err(ApiError::BadRequest(format!("session is {other}")));
        }
    }
    if session.expires_at <= OffsetDateTime::now_utc() {
        return Err(ApiError::BadRequest("session expired".to_string()));
    }
    if session.uploaded_size != session.total_size {
        return Err(ApiError::BadRequest(format!(
            "upload incomplete: {}/{} bytes",
            session.uploaded_size, session.total_size
        )));
    }

    // Flip to processing synchronously so the client's next status poll
    // already sees it, then run the pipeline detached from this request.
    state
        .metadata
        .update_upload_status(session_id, UploadStatus::Processing.as_str(), 0.0, None)
        .await?;

    tracing::info!(session_id = %session_id, strategy = ?req.strategy, "Finalize accepted, pipeline starting");
    tokio::spawn(run_upload_pipeline(
        state.clone(),
        session,
        req.strategy,
        req.manual_chunk_sizes,
    ));

    Ok(Json(serde_json::json!({
        "message": "processing started",
        "session_id": session_id.to_string(),
        "status_url": format!("/api/files/upload/status/{session_id}"),
    })))
}

/// GET /api/files/upload/status/{session_id} - session snapshot.
pub async fn upload_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AxumPath(session_id): AxumPath<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let session_id = parse_session_id(&session_id)?;
    let session = get_owned_session(&state, session_id, user.user_id).await?;

    Ok(Json(serde_json::json!({
        "status": session.status,
        "uploaded_size": session.uploaded_size,
        "total_size": session.total_size,
        "processing_progress": session.processing_progress,
        "error_message": session.error_message,
        "completed_at": session
            .completed_at
            .and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok()),
    })))
}

/// GET /api/files/download-key/{session_id} - retrieve the emitted key file.
pub async fn download_key_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    AxumPath(session_id): AxumPath<String>,
) -> ApiResult<Response> {
    let session_id = parse_session_id(&session_id)?;
    let session = get_owned_session(&state, session_id, user.user_id).await?;

    if session.status != UploadStatus::Complete.as_str() {
        return Err(ApiError::BadRequest("processing not complete".to_string()));
    }

    let download_name = format!(
        "{}_{}.{}",
        session.original_filename,
        session.file_id,
        shardbox_core::KEY_FILE_EXTENSION
    );
    let key_file_path = match &session.key_file_path {
        Some(path) => PathBuf::from(path),
        None => {
            // Older sessions only recorded the temp path; the key file sits
            // next to it.
            Path::new(&session.temp_file_path)
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&download_name)
        }
    };

    let data = tokio::fs::read(&key_file_path)
        .await
        .map_err(|_| ApiError::NotFound("key file not found".to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={download_name}"),
            ),
        ],
        data,
    )
        .into_response())
}

fn parse_session_id(raw: &str) -> ApiResult<Uuid> {
    SessionId::parse(raw)
        .map(|id| *id.as_uuid())
        .map_err(|_| ApiError::BadRequest("invalid session_id".to_string()))
}

async fn get_owned_session(
    state: &AppState,
    session_id: Uuid,
    user_id: Uuid,
) -> ApiResult<UploadSessionRow> {
    let session = state
        .metadata
        .get_upload_session(session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("session not found".to_string()))?;
    if session.user_id != user_id {
        return Err(ApiError::Unauthorized("unauthorized".to_string()));
    }
    Ok(session)
}

// ===== Background pipeline =====

/// A pipeline stage failure: which stage, at what progress, and why.
struct StageError {
    stage: &'static str,
    progress: f64,
    message: String,
}

impl StageError {
    fn new(stage: &'static str, progress: f64, message: impl ToString) -> Self {
        Self {
            stage,
            progress,
            message: message.to_string(),
        }
    }
}

/// Run the finalize pipeline for one session.
///
/// Detached from the originating request: a client disconnect does not
/// abort processing. All outcomes are reported through the session record.
pub async fn run_upload_pipeline(
    state: AppState,
    session: UploadSessionRow,
    strategy: ChunkingStrategy,
    manual_sizes: Option<Vec<u64>>,
) {
    let session_id = session.session_id;
    let obfuscated_path = PathBuf::from(format!("{}.obfuscated", session.temp_file_path));

    if let Err(e) = execute_pipeline(
        &state,
        &session,
        strategy,
        manual_sizes.as_deref(),
        &obfuscated_path,
    )
    .await
    {
        tracing::error!(
            session_id = %session_id,
            stage = e.stage,
            error = %e.message,
            "Upload pipeline failed"
        );
        let _ = state
            .metadata
            .update_upload_status(
                session_id,
                UploadStatus::Failed.as_str(),
                e.progress,
                Some(&format!("{}: {}", e.stage, e.message)),
            )
            .await;
    }

    // The obfuscated intermediate is only needed within the pipeline.
    let _ = tokio::fs::remove_file(&obfuscated_path).await;
    schedule_temp_cleanup(state, session_id);
}

async fn execute_pipeline(
    state: &AppState,
    session: &UploadSessionRow,
    strategy: ChunkingStrategy,
    manual_sizes: Option<&[u64]>,
    obfuscated_path: &Path,
) -> Result<(), StageError> {
    let session_id = session.session_id;
    let file_id = FileId::parse(&session.file_id)
        .map_err(|e| StageError::new("obfuscate", 10.0, e))?;
    let set_progress = |p: f64| {
        let metadata = state.metadata.clone();
        async move {
            let _ = metadata
                .update_upload_status(session_id, UploadStatus::Processing.as_str(), p, None)
                .await;
        }
    };

    // Step 1: obfuscate (10%)
    set_progress(10.0).await;
    let seed = Seed::generate();
    let params = state.config.obfuscation.params();
    let (obf_metadata, processed_size) = {
        let input = PathBuf::from(&session.temp_file_path);
        let output = obfuscated_path.to_path_buf();
        let seed = seed.clone();
        tokio::task::spawn_blocking(move || {
            shardbox_core::obfuscate::obfuscate_file(&input, &output, &seed, &params)
        })
        .await
        .map_err(|e| StageError::new("obfuscate", 10.0, e))?
        .map_err(|e| StageError::new("obfuscate", 10.0, e))?
    };
    tracing::info!(session_id = %session_id, processed_size, "Obfuscation complete");

    // Step 2: query drive spaces (20%)
    set_progress(20.0).await;
    let spaces =
        shardbox_drive::list_drive_spaces(state.drive.as_ref(), state.metadata.as_ref(), session.user_id)
            .await
            .map_err(|e| StageError::new("drive spaces", 20.0, e))?;

    // Step 3: plan (30%)
    set_progress(30.0).await;
    let plan = calculate_plan(processed_size, &spaces, strategy, manual_sizes)
        .map_err(|e| StageError::new("plan", 30.0, e))?;
    tracing::info!(session_id = %session_id, chunks = plan.len(), "Chunk plan ready");

    // Step 4: split (50%)
    set_progress(50.0).await;
    let chunk_dir = obfuscated_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let chunk_paths = {
        let input = obfuscated_path.to_path_buf();
        let plan = plan.clone();
        let file_id = file_id.clone();
        let dir = chunk_dir.clone();
        tokio::task::spawn_blocking(move || {
            shardbox_core::split::split_file(&input, &dir, &plan, &file_id)
        })
        .await
        .map_err(|e| StageError::new("split", 50.0, e))?
        .map_err(|e| StageError::new("split", 50.0, e))?
    };

    // Step 5: upload chunks, manifest updates, chunk metadata (70–90%)
    let upload_result = upload_chunks(state, session, &file_id, &plan, &chunk_paths).await;

    // Local chunk files are spent either way.
    for path in &chunk_paths {
        let _ = tokio::fs::remove_file(path).await;
    }
    let (stored_chunks, key_chunks) = upload_result?;

    // Step 6: stored-file record (93%)
    set_progress(93.0).await;
    let stored_file = StoredFileRow {
        file_id: session.file_id.clone(),
        user_id: session.user_id,
        original_filename: session.original_filename.clone(),
        original_size: session.total_size,
        processed_size: processed_size as i64,
        obfuscation_seed: obf_metadata.seed_b64.clone(),
        status: "active".to_string(),
        created_at: OffsetDateTime::now_utc(),
    };
    state
        .metadata
        .create_stored_file(&stored_file, &stored_chunks)
        .await
        .map_err(|e| StageError::new("stored file", 93.0, e))?;

    // Step 7: key file (95%)
    set_progress(95.0).await;
    let key_file = KeyFile::new(
        file_id.clone(),
        session.original_filename.clone(),
        session.total_size as u64,
        processed_size,
        obf_metadata,
        key_chunks,
    );
    let key_file_path = chunk_dir.join(key_file.download_name());
    {
        let key_file = key_file.clone();
        let path = key_file_path.clone();
        tokio::task::spawn_blocking(move || key_file.write(&path))
            .await
            .map_err(|e| StageError::new("key file", 95.0, e))?
            .map_err(|e| StageError::new("key file", 95.0, e))?;
    }
    state
        .metadata
        .set_key_file_path(session_id, &key_file_path.to_string_lossy())
        .await
        .map_err(|e| StageError::new("key file", 95.0, e))?;

    // Step 8: complete (100%)
    state
        .metadata
        .complete_upload_session(session_id, OffsetDateTime::now_utc())
        .await
        .map_err(|e| StageError::new("complete", 95.0, e))?;

    tracing::info!(session_id = %session_id, file_id = %file_id, "Upload pipeline complete");
    Ok(())
}

/// Step 5: upload every chunk to its drive, updating that drive's manifest
/// and collecting metadata rows. On any failure, chunks already uploaded in
/// this run are deleted best-effort before the error is surfaced.
async fn upload_chunks(
    state: &AppState,
    session: &UploadSessionRow,
    file_id: &FileId,
    plan: &[ChunkPlan],
    chunk_paths: &[PathBuf],
) -> Result<(Vec<StoredChunkRow>, Vec<ChunkMetadata>), StageError> {
    let session_id = session.session_id;
    let total = plan.len();
    let mut stored_chunks = Vec::with_capacity(total);
    let mut key_chunks = Vec::with_capacity(total);
    let mut uploaded: Vec<(Uuid, String)> = Vec::with_capacity(total);

    for (i, (chunk, chunk_path)) in plan.iter().zip(chunk_paths).enumerate() {
        let progress = 70.0 + 20.0 * i as f64 / total as f64;
        let _ = state
            .metadata
            .update_upload_status(session_id, UploadStatus::Processing.as_str(), progress, None)
            .await;
        tracing::info!(
            session_id = %session_id,
            chunk = i + 1,
            total,
            "Uploading chunk"
        );

        let filename = chunk_filename(file_id, chunk.chunk_id);

        let result: Result<(StoredChunkRow, ChunkMetadata), String> = async {
            let drive_file_id = state
                .drive
                .upload(chunk.drive_account_id, chunk_path, &filename)
                .await
                .map_err(|e| e.to_string())?;
            uploaded.push((chunk.drive_account_id, drive_file_id.clone()));

            let checksum = {
                let path = chunk_path.clone();
                tokio::task::spawn_blocking(move || ContentHash::compute_file(&path))
                    .await
                    .map_err(|e| e.to_string())?
                    .map_err(|e| e.to_string())?
                    .to_hex()
            };

            let account = state
                .metadata
                .get_drive_account(chunk.drive_account_id)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("drive account {} not found", chunk.drive_account_id))?;

            let (manifest, manifest_file_id) = state
                .manifests
                .get_or_create(chunk.drive_account_id)
                .await
                .map_err(|e| e.to_string())?;

            let drive_id = account
                .drive_id
                .or_else(|| manifest.drive_id.map(|d| d.as_str().to_string()));

            // Manifest update is best-effort: the stored-file record is the
            // authoritative map from file to drive file ids.
            let entry = ManifestFile {
                file_id: file_id.to_string(),
                original_filename: session.original_filename.clone(),
                uploaded_at: OffsetDateTime::now_utc(),
                chunks: vec![ManifestChunk {
                    chunk_id: chunk.chunk_id,
                    filename: filename.clone(),
                    drive_file_id: drive_file_id.clone(),
                    size: chunk.size,
                    checksum: checksum.clone(),
                }],
            };
            if let Err(e) = state
                .manifests
                .add_file(chunk.drive_account_id, &manifest_file_id, entry)
                .await
            {
                tracing::warn!(
                    session_id = %session_id,
                    account_id = %chunk.drive_account_id,
                    error = %e,
                    "Failed to update drive manifest"
                );
            }

            let stored = StoredChunkRow {
                user_id: session.user_id,
                file_id: file_id.to_string(),
                chunk_id: i64::from(chunk.chunk_id),
                drive_account_id: chunk.drive_account_id,
                drive_id: drive_id.clone(),
                drive_file_id: drive_file_id.clone(),
                filename: filename.clone(),
                size_bytes: chunk.size as i64,
                checksum: checksum.clone(),
                start_offset: chunk.start_offset as i64,
                end_offset: chunk.end_offset as i64,
            };
            let key = ChunkMetadata {
                chunk_id: chunk.chunk_id,
                drive_account_id: chunk.drive_account_id,
                drive_id,
                drive_file_id,
                filename,
                start_offset: chunk.start_offset,
                end_offset: chunk.end_offset,
                size: chunk.size,
                checksum,
            };
            Ok((stored, key))
        }
        .await;

        match result {
            Ok((stored, key)) => {
                stored_chunks.push(stored);
                key_chunks.push(key);
            }
            Err(message) => {
                rollback_uploaded_chunks(state, &uploaded).await;
                return Err(StageError::new("upload", progress, message));
            }
        }
    }

    Ok((stored_chunks, key_chunks))
}

/// Best-effort deletion of chunks uploaded earlier in a failed run.
async fn rollback_uploaded_chunks(state: &AppState, uploaded: &[(Uuid, String)]) {
    for (account_id, drive_file_id) in uploaded {
        if let Err(e) = state.drive.delete(*account_id, drive_file_id).await {
            tracing::warn!(
                account_id = %account_id,
                drive_file_id = %drive_file_id,
                error = %e,
                "Chunk rollback failed"
            );
        }
    }
}

/// Delete the session's temp inputs after the configured delay.
fn schedule_temp_cleanup(state: AppState, session_id: Uuid) {
    let delay = state.config.upload.temp_file_cleanup();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Ok(Some(session)) = state.metadata.get_upload_session(session_id).await {
            let _ = tokio::fs::remove_file(&session.temp_file_path).await;
            if let Some(key_path) = &session.key_file_path {
                let _ = tokio::fs::remove_file(key_path).await;
            }
        }
    });
}
