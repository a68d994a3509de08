//! Artifact registry surface: listing, descriptors and blob-backed
//! delivery.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use clipforge_blob::DeliveryScope;
use clipforge_models::{Artifact, ArtifactId, JobId};

use crate::error::{ApiError, ApiResult};
use crate::principal::Principal;
use crate::state::AppState;

/// Artifact descriptor with a retrievable URL.
#[derive(Debug, Serialize)]
pub struct ArtifactDescriptor {
    pub id: String,
    pub job_id: String,
    pub ordinal: u32,
    pub duration: f64,
    pub source_start: f64,
    pub source_end: f64,
    pub aspect_ratio: String,
    pub captions_added: bool,
    pub viral_score: f64,
    pub file_name: String,
    /// Opaque, expiring URL for playback
    pub url: String,
    /// Opaque, expiring URL for download
    pub download_url: String,
}

fn descriptor(
    state: &AppState,
    principal: &Principal,
    artifact: &Artifact,
) -> ApiResult<ArtifactDescriptor> {
    let url = state
        .signer
        .signed_url(
            artifact.id.as_str(),
            principal.id.as_str(),
            DeliveryScope::Playback,
        )
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let download_url = state
        .signer
        .signed_url(
            artifact.id.as_str(),
            principal.id.as_str(),
            DeliveryScope::Download,
        )
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(ArtifactDescriptor {
        id: artifact.id.to_string(),
        job_id: artifact.job_id.to_string(),
        ordinal: artifact.ordinal,
        duration: artifact.duration,
        source_start: artifact.source_start,
        source_end: artifact.source_end,
        aspect_ratio: artifact.aspect_ratio.as_str().to_string(),
        captions_added: artifact.captions_added,
        viral_score: artifact.viral_score,
        file_name: artifact.file_name.clone(),
        url,
        download_url,
    })
}

#[derive(Debug, Serialize)]
pub struct ArtifactListResponse {
    pub artifacts: Vec<ArtifactDescriptor>,
}

/// GET /jobs/{id}/artifacts
pub async fn list_job_artifacts(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<ArtifactListResponse>> {
    let job_id = JobId::from(id);
    state.store.jobs.get_owned(&job_id, &principal.id).await?;

    let artifacts = state.store.artifacts.list_by_job(&job_id).await;
    let descriptors = artifacts
        .iter()
        .map(|a| descriptor(&state, &principal, a))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(ArtifactListResponse {
        artifacts: descriptors,
    }))
}

/// GET /artifacts/{id}
pub async fn get_artifact(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<ArtifactDescriptor>> {
    let artifact = state
        .store
        .artifacts
        .get(&ArtifactId::from(id))
        .await?;
    // Access is gated by ownership of the parent job.
    state
        .store
        .jobs
        .get_owned(&artifact.job_id, &principal.id)
        .await?;
    Ok(Json(descriptor(&state, &principal, &artifact)?))
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub token: String,
}

/// GET /artifacts/{id}/file?token=...
///
/// The token authenticates the request by itself; no principal header is
/// required so the URL can be handed to a player.
pub async fn fetch_artifact_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> ApiResult<Response> {
    let token = state
        .signer
        .decode(&query.token)
        .map_err(|_| ApiError::forbidden("invalid or expired delivery token"))?;
    if token.aid != id {
        return Err(ApiError::forbidden("token does not match artifact"));
    }

    let artifact = state.store.artifacts.get(&ArtifactId::from(id)).await?;
    let meta = state.blobs.stat(&artifact.blob_id).await?;
    let path = state.blobs.path(&artifact.blob_id).await?;

    let file = tokio::fs::File::open(path).await?;
    let stream = futures_util::stream::unfold(file, |mut file| async move {
        use tokio::io::AsyncReadExt;
        let mut buf = vec![0u8; 64 * 1024];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok::<_, std::io::Error>(buf), file))
            }
            Err(e) => Some((Err(e), file)),
        }
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, meta.content_type)
        .header(header::CONTENT_LENGTH, meta.size);

    if token.scope == DeliveryScope::Download.as_str() {
        response = response.header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        );
    }

    response
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(e.to_string()))
        .map(IntoResponse::into_response)
}
