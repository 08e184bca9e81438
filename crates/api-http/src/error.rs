//! HTTP Error Mapping
//!
//! Caller faults are 400, bad credentials 401, everything the service or
//! the generator got wrong is 500 with whatever diagnostics were captured.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use forge_core::JobError;
use thiserror::Error;
use tracing::{error, warn};

use crate::types::ErrorResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("missing or invalid API key")]
    Unauthorized,
}

/// Status code for a job failure
pub fn status_for(err: &JobError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Job(err) => {
                let status = status_for(err);
                if status.is_server_error() {
                    error!(kind = %err.kind(), error = %err, "Job failed");
                } else {
                    warn!(kind = %err.kind(), error = %err, "Job rejected");
                }
                (status, ErrorResponse::from(err))
            }
            ApiError::Multipart(err) => (
                err.status(),
                ErrorResponse::new("validation_error", self.to_string()),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("unauthorized", self.to_string()),
            ),
        };
        (status, Json(body)).into_response()
    }
}
