// Application Layer - Use Cases

pub mod orchestrator;
pub mod recovery; // Startup sweep

// Re-exports
pub use orchestrator::{
    in_job_task, spawn_job_blocking, spawn_job_task, GeneratedSdk, JobOrchestrator, JobOutcome,
    OrchestratorConfig, ValidationReport, WorkspaceLease,
};
pub use recovery::RecoveryService;
