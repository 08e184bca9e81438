// Project Materializer Port

use async_trait::async_trait;

use crate::domain::{GeneratorConfig, InputSpec, JobKind, ProjectLayout};
use crate::error::Result;
use crate::port::workspace::Workspace;

/// Inputs for one materialization
#[derive(Debug, Clone, Copy)]
pub struct MaterializeRequest<'a> {
    pub input_spec: Option<&'a InputSpec>,
    pub kind: JobKind,
    /// Resolved generator; None for validate jobs, which get a minimal stub
    pub generator: Option<&'a GeneratorConfig>,
}

/// Project Materializer trait
#[async_trait]
pub trait ProjectMaterializer: Send + Sync {
    /// Write the project skeleton, input spec, project identity and
    /// generator configuration into `workspace`
    ///
    /// # Errors
    /// - JobError::Validation if the input spec is missing (nothing is written)
    /// - JobError::Resource on any filesystem failure
    async fn materialize(
        &self,
        workspace: &Workspace,
        request: MaterializeRequest<'_>,
    ) -> Result<ProjectLayout>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::JobError;

    /// Creates every required entry with placeholder contents
    #[derive(Default)]
    pub struct MockProjectMaterializer;

    #[async_trait]
    impl ProjectMaterializer for MockProjectMaterializer {
        async fn materialize(
            &self,
            workspace: &Workspace,
            request: MaterializeRequest<'_>,
        ) -> Result<ProjectLayout> {
            if request.input_spec.is_none() {
                return Err(JobError::Validation("missing input spec".to_string()));
            }

            let mut layout = ProjectLayout::for_workspace(workspace.path());
            if let Some(generator) = request.generator {
                layout = layout.with_output_subpath(&generator.output_subpath());
            }

            let io = |e: std::io::Error| JobError::resource("mock materialize", e);
            std::fs::create_dir_all(&layout.spec_dir).map_err(io)?;
            std::fs::create_dir_all(&layout.output_dir).map_err(io)?;
            std::fs::write(&layout.spec_file, "openapi: 3.0.0").map_err(io)?;
            std::fs::write(&layout.project_config_file, "{}").map_err(io)?;
            std::fs::write(&layout.generators_file, "groups: {}").map_err(io)?;
            Ok(layout)
        }
    }
}
