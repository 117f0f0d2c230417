use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use spool_jobs::{
    ChunkReceipt, CompleteReceipt, InitRequest, InitResponse, JobError, JobId, JobSnapshot,
    JobStatus,
};

use crate::{SpoolAxumError, SpoolAxumState};

type Result<T> = std::result::Result<T, SpoolAxumError>;

/// Body returned by pause, resume and cancel
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

fn map_json_rejection(rejection: JsonRejection) -> SpoolAxumError {
    JobError::invalid(format!("Failed to parse the request body as JSON: {}", rejection.body_text())).into()
}

fn map_path_rejection(rejection: PathRejection) -> SpoolAxumError {
    JobError::invalid(rejection.body_text()).into()
}

/// Job routes, relative to where they are nested (normally `/api/jobs`)
pub fn jobs_router(state: SpoolAxumState) -> Router<()> {
    Router::new()
        .route("/init", post(init))
        .route("/{id}", get(snapshot))
        .route("/{id}/chunks/{index}", put(upload_chunk))
        .route("/{id}/complete", post(complete))
        .route("/{id}/pause", post(pause))
        .route("/{id}/resume", post(resume))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/status", get(status))
        .with_state(state)
}

async fn init(
    State(state): State<SpoolAxumState>,
    body: std::result::Result<Json<InitRequest>, JsonRejection>,
) -> Result<Json<InitResponse>> {
    let Json(request) = body.map_err(map_json_rejection)?;
    Ok(Json(state.jobs.init(request).await?))
}

async fn upload_chunk(
    State(state): State<SpoolAxumState>,
    path: std::result::Result<Path<(String, u32)>, PathRejection>,
    body: Bytes,
) -> Result<Json<ChunkReceipt>> {
    let Path((id, index)) = path.map_err(map_path_rejection)?;
    let receipt = state.jobs.upload_chunk(&JobId::from(id), index, body).await?;
    Ok(Json(receipt))
}

async fn complete(
    State(state): State<SpoolAxumState>,
    Path(id): Path<String>,
) -> Result<Json<CompleteReceipt>> {
    Ok(Json(state.jobs.complete(&JobId::from(id)).await?))
}

async fn pause(State(state): State<SpoolAxumState>, Path(id): Path<String>) -> Result<Json<ControlResponse>> {
    let job_id = JobId::from(id);
    let status = state.jobs.pause(&job_id)?;
    Ok(Json(ControlResponse { job_id, status }))
}

async fn resume(State(state): State<SpoolAxumState>, Path(id): Path<String>) -> Result<Json<ControlResponse>> {
    let job_id = JobId::from(id);
    let status = state.jobs.resume(&job_id)?;
    Ok(Json(ControlResponse { job_id, status }))
}

async fn cancel(State(state): State<SpoolAxumState>, Path(id): Path<String>) -> Result<Json<ControlResponse>> {
    let job_id = JobId::from(id);
    let status = state.jobs.cancel(&job_id).await?;
    Ok(Json(ControlResponse { job_id, status }))
}

async fn status(State(state): State<SpoolAxumState>, Path(id): Path<String>) -> Result<String> {
    Ok(state.jobs.status(&JobId::from(id))?.to_string())
}

async fn snapshot(State(state): State<SpoolAxumState>, Path(id): Path<String>) -> Result<Json<JobSnapshot>> {
    Ok(Json(state.jobs.snapshot(&JobId::from(id))?))
}
