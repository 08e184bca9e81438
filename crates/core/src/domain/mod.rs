// Domain Layer - Pure business logic and entities

pub mod error;
pub mod generator;
pub mod job;
pub mod layout;
pub mod options;

// Re-exports
pub use error::DomainError;
pub use generator::{GeneratorConfig, GeneratorVariant, TargetLanguage};
pub use job::{InputSpec, Job, JobId, JobKind, JobRequest, JobState, PackageName};
pub use layout::ProjectLayout;
pub use options::JobOptions;
