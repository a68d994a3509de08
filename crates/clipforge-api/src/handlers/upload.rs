//! Resumable chunked upload handlers.
//!
//! `init` creates a session, chunks arrive as multipart posts in any
//! order, `complete` streams them in index order through the digest into
//! the blob store. The detected content type is authoritative; the
//! declared one only feeds quota accounting.

use std::path::PathBuf;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use clipforge_blob::{extension_allowed, BlobStore};
use clipforge_models::{UploadId, UploadSession};

use crate::error::{ApiError, ApiResult};
use crate::principal::Principal;
use crate::state::AppState;

/// Smallest accepted chunk size (64 KiB).
const MIN_CHUNK_BYTES: u32 = 64 * 1024;

/// Largest accepted chunk size (16 MiB).
const MAX_CHUNK_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct InitUploadRequest {
    pub filename: String,
    pub size: u64,
    pub content_type: String,
    /// Optional chunk size override
    #[serde(default)]
    pub chunk_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct InitUploadResponse {
    pub upload_id: String,
    pub chunk_size: u32,
    pub total_chunks: u32,
    pub expires_at: DateTime<Utc>,
}

/// POST /upload/init
pub async fn init_upload(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<InitUploadRequest>,
) -> ApiResult<(StatusCode, Json<InitUploadResponse>)> {
    if request.size == 0 {
        return Err(ApiError::invalid("size must be positive"));
    }
    if request.size > state.config.max_upload_bytes {
        return Err(ApiError::Oversize(format!(
            "{} bytes exceeds the {} byte limit",
            request.size, state.config.max_upload_bytes
        )));
    }
    if !extension_allowed(&request.filename) {
        return Err(ApiError::RejectedType(format!(
            "unsupported file extension in {:?}",
            request.filename
        )));
    }
    if !request.content_type.starts_with("video/") {
        return Err(ApiError::RejectedType(format!(
            "declared type {:?} is not a video type",
            request.content_type
        )));
    }

    let chunk_size = request
        .chunk_size
        .unwrap_or(state.config.upload_chunk_bytes)
        .clamp(MIN_CHUNK_BYTES, MAX_CHUNK_BYTES);

    let ttl = chrono::Duration::from_std(state.config.upload_ttl)
        .unwrap_or_else(|_| chrono::Duration::hours(24));
    let session = UploadSession::new(
        principal.id,
        request.filename,
        request.size,
        request.content_type,
        chunk_size,
        ttl,
    );

    fs::create_dir_all(staging_dir(&state, &session.id)).await?;
    state.store.uploads.create(&session).await?;

    info!(
        upload_id = %session.id,
        size = session.size,
        chunks = session.total_chunks,
        "Upload session created"
    );

    Ok((
        StatusCode::CREATED,
        Json(InitUploadResponse {
            upload_id: session.id.to_string(),
            chunk_size: session.chunk_size,
            total_chunks: session.total_chunks,
            expires_at: session.expires_at,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    pub received_chunks: u32,
    pub total_chunks: u32,
}

/// POST /upload/chunk/{id}
///
/// Multipart form: `chunk_number` (integer) and `chunk` (binary).
/// Idempotent per index: a rewrite with identical length is a no-op, a
/// different length is a conflict.
pub async fn upload_chunk(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<ChunkResponse>> {
    let upload_id = UploadId::from_string(id);
    let session = get_live_session(&state, &upload_id, &principal).await?;

    let mut chunk_number: Option<u32> = None;
    let mut chunk_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("chunk_number") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::invalid(format!("unreadable chunk_number: {e}")))?;
                chunk_number = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| ApiError::invalid("chunk_number is not an integer"))?,
                );
            }
            Some("chunk") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::invalid(format!("unreadable chunk body: {e}")))?;
                chunk_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let index = chunk_number.ok_or_else(|| ApiError::invalid("missing chunk_number field"))?;
    let bytes = chunk_bytes.ok_or_else(|| ApiError::invalid("missing chunk field"))?;

    if index >= session.total_chunks {
        return Err(ApiError::invalid(format!(
            "chunk index {index} out of range (total {})",
            session.total_chunks
        )));
    }

    let expected = session.expected_chunk_len(index);
    if session.received.get(index) {
        // Idempotent retry when the length matches; conflict otherwise.
        return if bytes.len() as u64 == expected {
            debug!(upload_id = %upload_id, index, "Duplicate chunk accepted as no-op");
            Ok(Json(ChunkResponse {
                received_chunks: session.received.count_set(),
                total_chunks: session.total_chunks,
            }))
        } else {
            Err(ApiError::conflict(format!(
                "chunk {index} was already accepted with {expected} bytes"
            )))
        };
    }
    if bytes.len() as u64 != expected {
        return Err(ApiError::invalid(format!(
            "chunk {index} must be {expected} bytes, got {}",
            bytes.len()
        )));
    }

    fs::write(chunk_path(&state, &upload_id, index), &bytes).await?;

    let received = state
        .store
        .uploads
        .update(&upload_id, move |row| {
            row.received.set(index);
            Ok(row.received.count_set())
        })
        .await?;

    Ok(Json(ChunkResponse {
        received_chunks: received,
        total_chunks: session.total_chunks,
    }))
}

#[derive(Debug, Serialize)]
pub struct CompleteUploadResponse {
    pub blob_id: String,
    pub size: u64,
    pub content_type: String,
}

/// POST /upload/complete/{id}
pub async fn complete_upload(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<CompleteUploadResponse>> {
    let upload_id = UploadId::from_string(id);
    let session = get_live_session(&state, &upload_id, &principal).await?;

    if !session.is_complete() {
        let missing = session.received.missing_indices().len();
        return Err(ApiError::Incomplete(format!("{missing} chunks missing")));
    }

    // Stream chunks in index order through the digest into the store.
    let mut reader: Box<dyn tokio::io::AsyncRead + Send + Unpin> =
        Box::new(tokio::io::empty());
    for index in 0..session.total_chunks {
        let file = fs::File::open(chunk_path(&state, &upload_id, index)).await?;
        reader = Box::new(reader.chain(file));
    }
    let meta = state.blobs.put_stream(reader).await?;

    if meta.size != session.size {
        discard_blob(&state.blobs, &meta.id).await;
        return Err(ApiError::internal(format!(
            "assembled {} bytes, expected {}",
            meta.size, session.size
        )));
    }
    if meta.content_type == "application/octet-stream" {
        discard_blob(&state.blobs, &meta.id).await;
        return Err(ApiError::RejectedType(
            "content does not look like a supported video container".to_string(),
        ));
    }

    cleanup_session(&state, &upload_id).await;

    info!(
        upload_id = %upload_id,
        blob_id = %meta.id,
        content_type = %meta.content_type,
        "Upload promoted to blob"
    );

    Ok(Json(CompleteUploadResponse {
        blob_id: meta.id.to_string(),
        size: meta.size,
        content_type: meta.content_type,
    }))
}

/// POST /upload/abort/{id}
pub async fn abort_upload(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let upload_id = UploadId::from_string(id);
    // Ownership check; aborting an expired session is still allowed.
    state
        .store
        .uploads
        .get_owned(&upload_id, &principal.id)
        .await?;
    cleanup_session(&state, &upload_id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct UploadStatusResponse {
    pub upload_id: String,
    pub received_chunks: u32,
    pub total_chunks: u32,
    pub missing_indices: Vec<u32>,
    pub expires_at: DateTime<Utc>,
}

/// GET /upload/{id} — resumability metadata.
pub async fn upload_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<UploadStatusResponse>> {
    let upload_id = UploadId::from_string(id);
    let session = get_live_session(&state, &upload_id, &principal).await?;
    Ok(Json(UploadStatusResponse {
        upload_id: session.id.to_string(),
        received_chunks: session.received.count_set(),
        total_chunks: session.total_chunks,
        missing_indices: session.received.missing_indices(),
        expires_at: session.expires_at,
    }))
}

/// Delete sessions past their TTL together with their staged chunks.
/// Returns how many were swept.
pub async fn sweep_expired_uploads(state: &AppState) -> usize {
    let expired = state.store.uploads.expired().await;
    let count = expired.len();
    for session in expired {
        info!(upload_id = %session.id, "Expiring upload session");
        cleanup_session(state, &session.id).await;
    }
    count
}

async fn get_live_session(
    state: &AppState,
    upload_id: &UploadId,
    principal: &Principal,
) -> ApiResult<UploadSession> {
    let session = state
        .store
        .uploads
        .get_owned(upload_id, &principal.id)
        .await?;
    if session.is_expired(Utc::now()) {
        return Err(ApiError::Expired);
    }
    Ok(session)
}

fn staging_dir(state: &AppState, upload_id: &UploadId) -> PathBuf {
    state.config.upload_staging_dir.join(upload_id.as_str())
}

fn chunk_path(state: &AppState, upload_id: &UploadId, index: u32) -> PathBuf {
    staging_dir(state, upload_id).join(format!("chunk_{index:06}"))
}

async fn cleanup_session(state: &AppState, upload_id: &UploadId) {
    if let Err(e) = fs::remove_dir_all(staging_dir(state, upload_id)).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(upload_id = %upload_id, error = %e, "Failed to remove upload staging dir");
        }
    }
    state.store.uploads.remove(upload_id).await.ok();
}

async fn discard_blob(blobs: &BlobStore, id: &clipforge_models::BlobId) {
    if let Err(e) = blobs.release(id).await {
        warn!(blob_id = %id, error = %e, "Failed to discard rejected blob");
    }
}
