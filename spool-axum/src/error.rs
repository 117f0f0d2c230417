use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use spool_jobs::JobError;

#[derive(Debug)]
pub struct SpoolAxumError(pub anyhow::Error);

impl From<anyhow::Error> for SpoolAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<JobError> for SpoolAxumError {
    fn from(e: JobError) -> Self {
        Self(e.into())
    }
}

/// HTTP status for a job error
pub fn status_for(error: &JobError) -> StatusCode {
    match error {
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        JobError::InvalidRequest(_) | JobError::IndexOutOfRange { .. } => StatusCode::BAD_REQUEST,
        JobError::IncompleteUpload { .. }
        | JobError::AlreadyAssembling { .. }
        | JobError::NotAcceptingChunks { .. }
        | JobError::Cancelled => StatusCode::CONFLICT,
        JobError::AssemblyFailed { .. } | JobError::UploadFailed { .. } | JobError::Storage { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn class_name(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "bad-request",
        StatusCode::NOT_FOUND => "not-found",
        StatusCode::CONFLICT => "conflict",
        _ => "general-error",
    }
}

fn error_response(status: StatusCode, name: &str, message: String) -> Response {
    let body = json!({
        "name": name,
        "message": message,
        "code": status.as_u16(),
        "className": class_name(status),
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for SpoolAxumError {
    fn into_response(self) -> Response {
        // Look through any anyhow context for the job error underneath
        if let Some(job) = self.0.chain().find_map(|e| e.downcast_ref::<JobError>()) {
            let status = status_for(job);
            if status.is_server_error() {
                tracing::error!(error = %job, "request failed");
            }
            return error_response(status, job.name(), job.to_string());
        }

        tracing::error!(error = %self.0, "request failed");
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "GeneralError",
            self.0.to_string(),
        )
    }
}
