// SDK Forge Infrastructure - System Adapters
// Implements: WorkspaceManager, ProjectMaterializer, ToolInvoker, ArtifactPackager

pub mod fs_workspace;
pub mod project_materializer;
pub mod subprocess_invoker;
pub mod tar_packager;

pub use fs_workspace::{FsWorkspaceManager, DEFAULT_WORKSPACE_PREFIX};
pub use project_materializer::{FsProjectMaterializer, ProjectIdentity, DEFAULT_ORGANIZATION};
pub use subprocess_invoker::{SubprocessToolInvoker, ToolSettings};
pub use tar_packager::TarGzPackager;
