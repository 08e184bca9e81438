//! HTTP Handlers
//!
//! Turns uploads into job requests and job outcomes into responses. All job
//! semantics live in the orchestrator.

use axum::extract::{Multipart, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use forge_core::application::{GeneratedSdk, JobOrchestrator};
use forge_core::domain::{InputSpec, JobKind, JobRequest};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::types::{self, HealthResponse, JobForm, ValidateResponse, SPEC_FIELDS};

/// Shared state for the HTTP API
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    pub workspace_root: PathBuf,
    pub tool_program: String,
    pub api_key: Option<Arc<str>>,
}

/// Rejects requests without the configured key (`x-api-key` or bearer)
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let headers = request.headers();
    let presented = headers
        .get(types::header::API_KEY)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        });

    if presented == Some(expected) {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Drain a multipart body into a job form
async fn read_form(query: HashMap<String, String>, mut multipart: Multipart) -> Result<JobForm, ApiError> {
    let mut form = JobForm::from_query(query);

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if SPEC_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            debug!(field = %name, file_name = ?file_name, bytes = bytes.len(), "Spec uploaded");
            form.spec = Some(InputSpec::new(file_name, bytes.to_vec()));
        } else {
            let value = field.text().await?;
            form.set_text(&name, value);
        }
    }

    Ok(form)
}

/// POST /generate
pub async fn generate(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(query, multipart).await?;
    let request = JobRequest {
        kind: JobKind::Generate,
        input_spec: form.spec,
        target_language: form.language.unwrap_or_default(),
        package_name: form.package_name,
        options: form.options,
    };

    let sdk = state.orchestrator.generate(request).await?;
    Ok(archive_response(sdk))
}

/// POST /validate
///
/// A failed check is a 200 carrying `valid: false`.
pub async fn validate(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<Json<ValidateResponse>, ApiError> {
    let form = read_form(query, multipart).await?;
    let request = JobRequest {
        kind: JobKind::Validate,
        input_spec: form.spec,
        target_language: form.language.unwrap_or_default(),
        package_name: form.package_name,
        options: form.options,
    };

    let report = state.orchestrator.validate(request).await?;
    Ok(Json(report.into()))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: forge_core::VERSION,
        workspace_root: state.workspace_root.display().to_string(),
        tool: state.tool_program.clone(),
    })
}

fn archive_response(sdk: GeneratedSdk) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(sdk.content_type));
    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", sdk.file_name))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&sdk.job_id) {
        headers.insert(types::header::JOB_ID, value);
    }
    headers.insert(
        types::header::LANGUAGE,
        HeaderValue::from_static(sdk.language.as_str()),
    );
    headers.insert(
        types::header::FALLBACK,
        HeaderValue::from_static(if sdk.fell_back { "true" } else { "false" }),
    );

    (headers, sdk.bytes).into_response()
}
