//! Job submission, inspection and cancellation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use clipforge_models::{
    BlobId, Job, JobError, JobId, JobOptions, JobResults, JobType, Progress, Transcript,
};
use clipforge_store::JobFilter;

use crate::error::{ApiError, ApiResult};
use crate::principal::Principal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub blob_id: String,
    #[serde(default)]
    pub options: JobOptions,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
}

/// Job snapshot as served to clients. Worker bookkeeping (leases) stays
/// internal.
#[derive(Debug, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub job_type: JobType,
    pub input_blob_id: String,
    pub options: JobOptions,
    pub status: String,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<JobResults>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobSnapshot {
    fn from(job: Job) -> Self {
        Self {
            id: job.id.to_string(),
            job_type: job.job_type,
            input_blob_id: job.input_blob_id.to_string(),
            options: job.options,
            status: job.status.as_str().to_string(),
            progress: job.progress,
            error: job.error,
            results: job.results,
            attempts: job.attempts,
            created_at: job.created_at,
            updated_at: job.updated_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

/// POST /jobs
pub async fn submit_job(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let blob_id = BlobId::parse(&request.blob_id)
        .ok_or_else(|| ApiError::invalid("blob_id is not a content digest"))?;
    if !state.blobs.exists(&blob_id).await {
        return Err(ApiError::not_found(format!("blob {blob_id} not found")));
    }

    let job = Job::new(
        principal.id,
        blob_id.clone(),
        request.options,
        principal.plan.priority_class(),
        state.scheduler.config().max_attempts,
    );

    // The job holds a reference on its input for its whole lifetime.
    state.blobs.add_ref(&blob_id).await?;
    state.store.jobs.create(&job).await?;
    state.scheduler.submit(&job).await?;

    info!(job_id = %job.id, priority = job.priority.as_str(), "Job submitted");

    Ok((
        StatusCode::CREATED,
        Json(SubmitJobResponse {
            job_id: job.id.to_string(),
        }),
    ))
}

/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job = state
        .store
        .jobs
        .get_owned(&JobId::from(id), &principal.id)
        .await?;
    Ok(Json(job.into()))
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSnapshot>,
}

/// GET /jobs — paginated list with status/type/date filters.
pub async fn list_jobs(
    State(state): State<AppState>,
    principal: Principal,
    Query(filter): Query<JobFilter>,
) -> ApiResult<Json<JobListResponse>> {
    let jobs = state
        .store
        .jobs
        .list(&principal.id, &filter.normalized())
        .await;
    Ok(Json(JobListResponse {
        jobs: jobs.into_iter().map(Into::into).collect(),
    }))
}

/// POST /jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .scheduler
        .cancel(&JobId::from(id), &principal.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /jobs/{id}/transcript — for the social-copy collaborator.
pub async fn get_transcript(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Json<Transcript>> {
    let job_id = JobId::from(id);
    // Ownership gate before touching the transcript collection.
    state.store.jobs.get_owned(&job_id, &principal.id).await?;
    let transcript = state.store.transcripts.get(&job_id).await?;
    Ok(Json(transcript))
}
