// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod materializer;
pub mod packager;
pub mod time_provider;
pub mod tool_invoker;
pub mod workspace;

// Re-exports
pub use id_provider::IdProvider;
pub use materializer::{MaterializeRequest, ProjectMaterializer};
pub use packager::{Archive, ArtifactPackager, PackagingError};
pub use time_provider::TimeProvider;
pub use tool_invoker::{InvocationError, ToolCommand, ToolInvoker, ToolOutput};
pub use workspace::{Workspace, WorkspaceManager};
