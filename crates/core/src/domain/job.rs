// Job Domain Model

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::error::{DomainError, Result};
use crate::domain::options::JobOptions;

/// Job ID (UUID v4, filesystem-safe)
pub type JobId = String;

/// Longest package name accepted (npm's limit, the strictest of the registries we target)
pub const MAX_PACKAGE_NAME_LEN: usize = 214;

/// Job Kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Generate,
    Validate,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Generate => write!(f, "generate"),
            JobKind::Validate => write!(f, "validate"),
        }
    }
}

/// Job lifecycle state
///
/// Both kinds share the spine up to `ProjectStaged`. Validate jobs branch to
/// `Validated`, generate jobs to `Packaged`; both then pass `Delivered` and
/// end in `Cleaned`. `Cleaned` is reachable from every state so that a
/// failure anywhere still tears the workspace down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Received,
    WorkspaceReady,
    Materialized,
    ToolAvailable,
    ToolInstalled,
    ProjectStaged,
    Invoked,
    Validated,
    Packaged,
    Delivered,
    Cleaned,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Received => "RECEIVED",
            JobState::WorkspaceReady => "WORKSPACE_READY",
            JobState::Materialized => "MATERIALIZED",
            JobState::ToolAvailable => "TOOL_AVAILABLE",
            JobState::ToolInstalled => "TOOL_INSTALLED",
            JobState::ProjectStaged => "PROJECT_STAGED",
            JobState::Invoked => "INVOKED",
            JobState::Validated => "VALIDATED",
            JobState::Packaged => "PACKAGED",
            JobState::Delivered => "DELIVERED",
            JobState::Cleaned => "CLEANED",
        };
        write!(f, "{}", name)
    }
}

/// Caller-supplied API description
#[derive(Debug, Clone)]
pub struct InputSpec {
    /// Original upload name, informational only
    pub file_name: Option<String>,
    pub contents: Vec<u8>,
}

impl InputSpec {
    pub fn new(file_name: Option<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name,
            contents: contents.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contents.iter().all(|b| b.is_ascii_whitespace())
    }
}

/// Package name, safe to embed in file names and generator config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    /// Validate and wrap a caller-supplied package name
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(DomainError::ValidationError(
                "package name must not be empty".to_string(),
            ));
        }
        if name.len() > MAX_PACKAGE_NAME_LEN {
            return Err(DomainError::ValidationError(format!(
                "package name too long ({} > {} chars)",
                name.len(),
                MAX_PACKAGE_NAME_LEN
            )));
        }
        if name.starts_with('.') {
            return Err(DomainError::ValidationError(
                "package name must not start with '.'".to_string(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(DomainError::ValidationError(format!(
                "package name '{}' must be alphanumeric with '-', '_' or '.'",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Already-parsed inbound request, as handed over by the transport layer
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub kind: JobKind,
    pub input_spec: Option<InputSpec>,
    pub target_language: String,
    pub package_name: Option<String>,
    pub options: JobOptions,
}

impl JobRequest {
    pub fn generate(
        input_spec: InputSpec,
        target_language: impl Into<String>,
        package_name: impl Into<String>,
    ) -> Self {
        Self {
            kind: JobKind::Generate,
            input_spec: Some(input_spec),
            target_language: target_language.into(),
            package_name: Some(package_name.into()),
            options: JobOptions::default(),
        }
    }

    pub fn validate(input_spec: InputSpec) -> Self {
        Self {
            kind: JobKind::Validate,
            input_spec: Some(input_spec),
            target_language: String::new(),
            package_name: None,
            options: JobOptions::default(),
        }
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }
}

/// Job Entity
///
/// Owned exclusively by the orchestrator for the duration of one request.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub target_language: String,
    pub package_name: PackageName,
    pub options: JobOptions,
    pub state: JobState,
    pub workspace: Option<PathBuf>,

    pub created_at: i64, // epoch ms
    pub finished_at: Option<i64>,
    /// Set when the job ended on a failure path
    pub failure: Option<String>,
}

impl Job {
    /// Create a new Job in `Received`
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        kind: JobKind,
        target_language: impl Into<String>,
        package_name: PackageName,
        options: JobOptions,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            target_language: target_language.into(),
            package_name,
            options,
            state: JobState::Received,
            workspace: None,
            created_at,
            finished_at: None,
            failure: None,
        }
    }

    /// Whether `self.state -> next` is a legal forward step
    pub fn can_advance(&self, next: JobState) -> bool {
        use JobState::*;

        if next == Cleaned {
            return self.state != Cleaned;
        }

        match (self.state, next) {
            (Received, WorkspaceReady)
            | (WorkspaceReady, Materialized)
            | (Materialized, ToolAvailable)
            | (ToolAvailable, ToolInstalled)
            | (ToolInstalled, ProjectStaged)
            | (ProjectStaged, Invoked)
            | (Validated, Delivered)
            | (Packaged, Delivered) => true,
            (Invoked, Validated) => self.kind == JobKind::Validate,
            (Invoked, Packaged) => self.kind == JobKind::Generate,
            _ => false,
        }
    }

    /// Transition to the next state
    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if !self.can_advance(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(job_id = %self.id, from = %self.state, to = %next, "Job state transition");
        self.state = next;
        Ok(())
    }

    /// Record a failure; the state is left where it failed until cleanup
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure = Some(reason.into());
    }

    /// Transition to `Cleaned` with explicit timestamp
    pub fn clean(&mut self, now_millis: i64) -> Result<()> {
        self.advance(JobState::Cleaned)?;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.state == JobState::Cleaned
    }
}
