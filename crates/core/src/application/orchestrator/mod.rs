// Job Orchestrator - sequences one job through its lifecycle

pub mod constants;
pub mod diagnostics;
mod lease;

pub use diagnostics::extract_diagnostics;
pub use lease::WorkspaceLease;

use constants::*;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::{
    GeneratorConfig, Job, JobKind, JobRequest, JobState, PackageName, ProjectLayout,
    TargetLanguage,
};
use crate::error::{JobError, Result};
use crate::port::{
    ArtifactPackager, IdProvider, InvocationError, MaterializeRequest, ProjectMaterializer,
    TimeProvider, ToolCommand, ToolInvoker, ToolOutput, Workspace, WorkspaceManager,
};

tokio::task_local! {
    static JOB_TASK: ();
}

/// Whether the caller is running inside a job task spawned by `submit`
///
/// Panic hooks use this to tell a contained job panic from a process fault.
pub fn in_job_task() -> bool {
    JOB_TASK.try_with(|_| ()).is_ok()
}

/// `spawn_blocking` that carries the job scope over to the blocking pool
///
/// Work a job hands off (archiving, workspace removal) stays attributable
/// to the job, so a panic there is contained like one on the job task.
pub fn spawn_job_blocking<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if in_job_task() {
        tokio::task::spawn_blocking(move || JOB_TASK.sync_scope((), f))
    } else {
        tokio::task::spawn_blocking(f)
    }
}

/// `tokio::spawn` that carries the job scope over to the new task
pub fn spawn_job_task<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    if in_job_task() {
        tokio::spawn(JOB_TASK.scope((), future))
    } else {
        tokio::spawn(future)
    }
}

/// Orchestrator settings, passed in at construction
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Ask the generator for debug-level output
    pub verbose: bool,
}

/// Packaged SDK ready to hand to the caller
#[derive(Debug, Clone)]
pub struct GeneratedSdk {
    pub job_id: String,
    /// `<package>-<language>-sdk.tar.gz`
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub language: TargetLanguage,
    pub fell_back: bool,
    pub file_count: usize,
}

/// Structured validation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub job_id: String,
    pub valid: bool,
    /// Ordered diagnostic lines; empty when valid
    pub diagnostics: Vec<String>,
}

/// What a finished job delivers
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Generated(GeneratedSdk),
    Validated(ValidationReport),
}

/// Job Orchestrator
///
/// The only component that decides when a workspace is released. Jobs share
/// nothing but the workspace root, so no registry or locking is needed here.
pub struct JobOrchestrator {
    workspaces: Arc<dyn WorkspaceManager>,
    materializer: Arc<dyn ProjectMaterializer>,
    invoker: Arc<dyn ToolInvoker>,
    packager: Arc<dyn ArtifactPackager>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: OrchestratorConfig,
}

impl JobOrchestrator {
    pub fn new(
        workspaces: Arc<dyn WorkspaceManager>,
        materializer: Arc<dyn ProjectMaterializer>,
        invoker: Arc<dyn ToolInvoker>,
        packager: Arc<dyn ArtifactPackager>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            workspaces,
            materializer,
            invoker,
            packager,
            id_provider,
            time_provider,
            config,
        }
    }

    /// Run a job on its own task
    ///
    /// A panicking job becomes `JobError::Internal`. Dropping the returned
    /// future does not cancel the job: it runs to completion and cleans up.
    pub async fn submit(self: &Arc<Self>, request: JobRequest) -> Result<JobOutcome> {
        let this = Arc::clone(self);
        let job = JOB_TASK.scope((), async move { this.run(request).await });
        let handle = tokio::task::spawn(job);

        match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                if join_err.is_panic() {
                    error!(error = ?join_err, "Job task panicked");
                    Err(JobError::Internal("job task panicked".to_string()))
                } else {
                    error!(error = ?join_err, "Job task cancelled");
                    Err(JobError::Internal("job task cancelled".to_string()))
                }
            }
        }
    }

    /// Submit a generate job
    pub async fn generate(self: &Arc<Self>, request: JobRequest) -> Result<GeneratedSdk> {
        if request.kind != JobKind::Generate {
            return Err(JobError::Validation(format!(
                "expected a generate job, got {}",
                request.kind
            )));
        }
        match self.submit(request).await? {
            JobOutcome::Generated(sdk) => Ok(sdk),
            JobOutcome::Validated(_) => Err(JobError::Internal(
                "generate job produced a validation report".to_string(),
            )),
        }
    }

    /// Submit a validate job
    pub async fn validate(self: &Arc<Self>, request: JobRequest) -> Result<ValidationReport> {
        if request.kind != JobKind::Validate {
            return Err(JobError::Validation(format!(
                "expected a validate job, got {}",
                request.kind
            )));
        }
        match self.submit(request).await? {
            JobOutcome::Validated(report) => Ok(report),
            JobOutcome::Generated(_) => Err(JobError::Internal(
                "validate job produced an archive".to_string(),
            )),
        }
    }

    /// Run a job on the current task
    ///
    /// Every path after allocation goes through `finish`, which releases the
    /// workspace before the result is returned.
    pub async fn run(&self, request: JobRequest) -> Result<JobOutcome> {
        let (mut job, generator) = self.receive(&request)?;

        info!(
            job_id = %job.id,
            kind = %job.kind,
            target_language = %job.target_language,
            package = %job.package_name,
            "Job received"
        );

        let workspace = match self.workspaces.allocate() {
            Ok(ws) => ws,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Workspace allocation failed");
                return Err(e);
            }
        };
        job.workspace = Some(workspace.root.clone());
        let lease = WorkspaceLease::new(Arc::clone(&self.workspaces), workspace);

        let result = self
            .drive(&mut job, &request, generator.as_ref(), lease.workspace())
            .await;

        self.finish(&mut job, lease, result).await
    }

    /// Received: validate caller input before touching the filesystem
    fn receive(&self, request: &JobRequest) -> Result<(Job, Option<GeneratorConfig>)> {
        match &request.input_spec {
            Some(spec) if !spec.is_empty() => {}
            _ => {
                return Err(JobError::Validation(
                    "an input specification file is required".to_string(),
                ))
            }
        }

        let package_name = match (request.kind, request.package_name.as_deref()) {
            (JobKind::Generate, None) => {
                return Err(JobError::Validation("package name is required".to_string()))
            }
            (_, Some(raw)) => PackageName::parse(raw)?,
            (JobKind::Validate, None) => PackageName::parse(DEFAULT_VALIDATE_PACKAGE)?,
        };

        let generator = match request.kind {
            JobKind::Generate => Some(GeneratorConfig::resolve(
                &request.target_language,
                package_name.clone(),
                &request.options,
            )?),
            JobKind::Validate => None,
        };

        let job = Job::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            request.kind,
            request.target_language.clone(),
            package_name,
            request.options.clone(),
        );
        Ok((job, generator))
    }

    /// WorkspaceReady -> ... -> Delivered
    async fn drive(
        &self,
        job: &mut Job,
        request: &JobRequest,
        generator: Option<&GeneratorConfig>,
        workspace: &Workspace,
    ) -> Result<JobOutcome> {
        job.advance(JobState::WorkspaceReady)?;

        let layout = self
            .materializer
            .materialize(
                workspace,
                MaterializeRequest {
                    input_spec: request.input_spec.as_ref(),
                    kind: job.kind,
                    generator,
                },
            )
            .await?;
        job.advance(JobState::Materialized)?;

        self.run_step(workspace, &ToolCommand::EnsureAvailable, &[])
            .await?;
        job.advance(JobState::ToolAvailable)?;

        self.run_step(workspace, &ToolCommand::Install, &[]).await?;
        job.advance(JobState::ToolInstalled)?;

        Self::stage(&layout)?;
        job.advance(JobState::ProjectStaged)?;

        match (job.kind, generator) {
            (JobKind::Validate, _) => {
                let report = self.check(job, workspace).await?;
                job.advance(JobState::Validated)?;
                job.advance(JobState::Delivered)?;
                Ok(JobOutcome::Validated(report))
            }
            (JobKind::Generate, Some(generator)) => {
                let sdk = self.generate_and_pack(job, workspace, generator).await?;
                job.advance(JobState::Delivered)?;
                Ok(JobOutcome::Generated(sdk))
            }
            (JobKind::Generate, None) => Err(JobError::Internal(
                "generate job without generator configuration".to_string(),
            )),
        }
    }

    /// ProjectStaged: the layout must match the tool contract exactly
    fn stage(layout: &ProjectLayout) -> Result<()> {
        let missing = layout.missing_entries();
        if missing.is_empty() {
            return Ok(());
        }
        let listed = missing
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(JobError::Resource(format!(
            "materialized project is incomplete, missing: {}",
            listed
        )))
    }

    /// Invoked -> Validated; a failing check is a result, not an error
    async fn check(&self, job: &mut Job, workspace: &Workspace) -> Result<ValidationReport> {
        let command = ToolCommand::Check;
        let output = self
            .invoker
            .invoke(workspace.path(), &command, &self.verbose_args())
            .await
            .map_err(|e| Self::invocation_failure(&command, e))?;
        job.advance(JobState::Invoked)?;

        let report = if output.success() {
            ValidationReport {
                job_id: job.id.clone(),
                valid: true,
                diagnostics: Vec::new(),
            }
        } else {
            let diagnostics = extract_diagnostics(&output);
            info!(
                job_id = %job.id,
                exit_code = ?output.exit_code,
                diagnostics = diagnostics.len(),
                "Validation failed"
            );
            ValidationReport {
                job_id: job.id.clone(),
                valid: false,
                diagnostics,
            }
        };
        Ok(report)
    }

    /// Invoked -> Packaged, then load the archive for delivery
    async fn generate_and_pack(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        generator: &GeneratorConfig,
    ) -> Result<GeneratedSdk> {
        let command = ToolCommand::Generate {
            group: Some(generator.group().to_string()),
        };
        self.run_step(workspace, &command, &self.verbose_args())
            .await?;
        job.advance(JobState::Invoked)?;

        let archive = self
            .packager
            .pack(workspace, &generator.output_subpath())
            .await?;
        job.advance(JobState::Packaged)?;

        let bytes = tokio::fs::read(&archive.path)
            .await
            .map_err(|e| JobError::resource(format!("read {}", archive.path.display()), e))?;

        info!(
            job_id = %job.id,
            archive_bytes = bytes.len(),
            files = archive.file_count,
            "SDK packaged"
        );

        Ok(GeneratedSdk {
            job_id: job.id.clone(),
            file_name: generator.archive_file_name(archive.extension),
            content_type: ARCHIVE_CONTENT_TYPE,
            bytes,
            language: generator.language(),
            fell_back: generator.fell_back,
            file_count: archive.file_count,
        })
    }

    /// Invoke and require a zero exit
    async fn run_step(
        &self,
        workspace: &Workspace,
        command: &ToolCommand,
        extra_args: &[String],
    ) -> Result<ToolOutput> {
        let output = self
            .invoker
            .invoke(workspace.path(), command, extra_args)
            .await
            .map_err(|e| Self::invocation_failure(command, e))?;

        if output.success() {
            Ok(output)
        } else {
            Err(Self::exit_failure(command, output))
        }
    }

    fn verbose_args(&self) -> Vec<String> {
        if self.config.verbose {
            VERBOSE_TOOL_ARGS.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        }
    }

    /// Non-zero exit -> taxonomy
    fn exit_failure(command: &ToolCommand, output: ToolOutput) -> JobError {
        let message = match output.exit_code {
            Some(code) => format!("{} exited with code {}", command, code),
            None => format!("{} was terminated by a signal", command),
        };
        match command {
            ToolCommand::EnsureAvailable => JobError::ToolUnavailable {
                message,
                output: Some(output),
            },
            ToolCommand::Install => JobError::ToolInstall {
                message,
                output: Some(output),
            },
            ToolCommand::Check | ToolCommand::Generate { .. } => JobError::ToolInvocation {
                command: command.name().to_string(),
                message,
                diagnostics: extract_diagnostics(&output),
                output: Some(output),
            },
        }
    }

    /// Could not run to completion -> taxonomy
    fn invocation_failure(command: &ToolCommand, err: InvocationError) -> JobError {
        let message = err.to_string();
        let output = match err {
            InvocationError::Timeout { output, .. } => output,
            _ => None,
        };
        match command {
            ToolCommand::EnsureAvailable => JobError::ToolUnavailable { message, output },
            ToolCommand::Install => JobError::ToolInstall { message, output },
            ToolCommand::Check | ToolCommand::Generate { .. } => JobError::ToolInvocation {
                command: command.name().to_string(),
                diagnostics: output
                    .as_ref()
                    .map(extract_diagnostics)
                    .unwrap_or_else(|| vec![message.clone()]),
                message,
                output,
            },
        }
    }

    /// -> Cleaned, unconditionally
    async fn finish(
        &self,
        job: &mut Job,
        lease: WorkspaceLease,
        result: Result<JobOutcome>,
    ) -> Result<JobOutcome> {
        if let Err(e) = &result {
            job.fail(e.to_string());
            warn!(
                job_id = %job.id,
                state = %job.state,
                kind = e.kind(),
                error = %e,
                "Job failed"
            );
        }

        let workspace = lease.workspace().root.clone();
        if let Err(e) = lease.release().await {
            // The result stays valid; the startup sweep removes any residue
            error!(
                job_id = %job.id,
                workspace = %workspace.display(),
                error = %e,
                "Workspace release failed"
            );
        }

        let now = self.time_provider.now_millis();
        job.clean(now)?;

        info!(
            job_id = %job.id,
            kind = %job.kind,
            success = result.is_ok(),
            duration_ms = now - job.created_at,
            "Job finished"
        );

        result
    }
}
