// Central Error Type for job execution

use thiserror::Error;

use crate::domain::DomainError;
use crate::port::packager::PackagingError;
use crate::port::tool_invoker::ToolOutput;

/// Job failure taxonomy
///
/// Every variant raised after workspace allocation is surfaced only after
/// the workspace has been released.
#[derive(Error, Debug)]
pub enum JobError {
    /// Missing or malformed caller input (client fault)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Workspace allocation, materialization or other filesystem failure
    #[error("Resource error: {0}")]
    Resource(String),

    /// External tool runtime is not present
    #[error("Tool unavailable: {message}")]
    ToolUnavailable {
        message: String,
        output: Option<ToolOutput>,
    },

    /// Installing the pinned tool version failed
    #[error("Tool install failed: {message}")]
    ToolInstall {
        message: String,
        output: Option<ToolOutput>,
    },

    /// check/generate exited non-zero (or could not run to completion)
    #[error("Tool invocation failed ({command}): {message}")]
    ToolInvocation {
        command: String,
        message: String,
        output: Option<ToolOutput>,
        diagnostics: Vec<String>,
    },

    /// Tool reported success but produced no usable output
    #[error("Packaging error: {0}")]
    Packaging(#[from] PackagingError),

    /// Illegal state transition (a defect, never caller-induced)
    #[error("Domain error: {0}")]
    Domain(String),

    /// Job task panicked or was aborted
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    pub fn resource(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        JobError::Resource(format!("{}: {}", context, err))
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "validation_error",
            JobError::Resource(_) => "resource_error",
            JobError::ToolUnavailable { .. } => "tool_unavailable_error",
            JobError::ToolInstall { .. } => "tool_install_error",
            JobError::ToolInvocation { .. } => "tool_invocation_error",
            JobError::Packaging(_) => "packaging_error",
            JobError::Domain(_) => "domain_error",
            JobError::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, JobError::Validation(_))
    }

    /// Captured subprocess output, where the failure came from a subprocess
    pub fn tool_output(&self) -> Option<&ToolOutput> {
        match self {
            JobError::ToolUnavailable { output, .. }
            | JobError::ToolInstall { output, .. }
            | JobError::ToolInvocation { output, .. } => output.as_ref(),
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> &[String] {
        match self {
            JobError::ToolInvocation { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

impl From<DomainError> for JobError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ValidationError(msg) => JobError::Validation(msg),
            other => JobError::Domain(other.to_string()),
        }
    }
}

/// Result type alias using JobError
pub type Result<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_validation_maps_to_client_error() {
        let err: JobError = DomainError::ValidationError("bad".to_string()).into();
        assert!(err.is_client_error());
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn test_state_violation_maps_to_server_error() {
        let err: JobError = DomainError::InvalidStateTransition {
            from: "RECEIVED".to_string(),
            to: "INVOKED".to_string(),
        }
        .into();
        assert!(!err.is_client_error());
        assert_eq!(err.kind(), "domain_error");
    }

    #[test]
    fn test_tool_output_is_exposed() {
        let err = JobError::ToolInstall {
            message: "npm failed".to_string(),
            output: Some(ToolOutput::failed(1, "", "E404")),
        };
        assert_eq!(err.tool_output().map(|o| o.stderr.as_str()), Some("E404"));
        assert!(err.diagnostics().is_empty());
    }
}
