//! HTTP Request/Response Types
//!
//! Both job endpoints take `multipart/form-data`:
//! - `spec` (or `file`): the API description document
//! - `language` / `targetLanguage`: generator to run (generate only)
//! - `packageName` / `package`: SDK package name
//! - any other text field: a generator option, forwarded as-is
//!
//! The same keys are accepted as query parameters; form fields win.

use forge_core::application::ValidationReport;
use forge_core::domain::{InputSpec, JobOptions};
use forge_core::JobError;
use serde::Serialize;
use std::collections::HashMap;

/// Field names carrying the spec upload
pub const SPEC_FIELDS: &[&str] = &["spec", "file"];
pub const LANGUAGE_FIELDS: &[&str] = &["language", "targetLanguage", "target_language"];
pub const PACKAGE_FIELDS: &[&str] = &["packageName", "package_name", "package"];

/// Response headers describing a delivered archive
pub mod header {
    pub const JOB_ID: &str = "x-forge-job-id";
    pub const LANGUAGE: &str = "x-forge-language";
    pub const FALLBACK: &str = "x-forge-language-fallback";
    pub const API_KEY: &str = "x-api-key";
}

/// Parsed job form
#[derive(Debug, Default)]
pub struct JobForm {
    pub spec: Option<InputSpec>,
    pub language: Option<String>,
    pub package_name: Option<String>,
    pub options: JobOptions,
}

impl JobForm {
    /// Seed from query parameters; multipart fields are applied on top
    pub fn from_query(query: HashMap<String, String>) -> Self {
        let mut form = Self::default();
        for (name, value) in query {
            form.set_text(&name, value);
        }
        form
    }

    pub fn set_text(&mut self, name: &str, value: String) {
        if LANGUAGE_FIELDS.contains(&name) {
            self.language = Some(value);
        } else if PACKAGE_FIELDS.contains(&name) {
            self.package_name = Some(value);
        } else {
            self.options.insert(name, value);
        }
    }
}

/// Error body for every non-2xx response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
            stdout: None,
            stderr: None,
            diagnostics: None,
        }
    }
}

impl From<&JobError> for ErrorResponse {
    fn from(err: &JobError) -> Self {
        let mut body = Self::new(err.kind(), err.to_string());
        if let Some(output) = err.tool_output() {
            body.stdout = Some(output.stdout.clone());
            body.stderr = Some(output.stderr.clone());
        }
        if !err.diagnostics().is_empty() {
            body.diagnostics = Some(err.diagnostics().to_vec());
        }
        body
    }
}

/// POST /validate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub job_id: String,
    pub valid: bool,
    pub diagnostics: Vec<String>,
}

impl From<ValidationReport> for ValidateResponse {
    fn from(report: ValidationReport) -> Self {
        Self {
            job_id: report.job_id,
            valid: report.valid,
            diagnostics: report.diagnostics,
        }
    }
}

/// GET /health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub workspace_root: String,
    pub tool: String,
}
