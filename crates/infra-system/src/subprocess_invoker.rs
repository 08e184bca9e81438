// Subprocess tool invoker
// reason: tokio::process for async child management, nix for graceful kill
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use forge_core::application::spawn_job_task;
use forge_core::port::{InvocationError, TimeProvider, ToolCommand, ToolInvoker, ToolOutput};

/// Generator CLI executable
pub const DEFAULT_TOOL_PROGRAM: &str = "fern";

/// Pinned generator CLI version
pub const DEFAULT_CLI_VERSION: &str = "0.45.0";

/// Placeholder substituted with the pinned version in the install argv
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Per-stream capture cap (1 MiB)
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Variables passed through to the tool; everything else is dropped
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "TMPDIR",
    "LANG",
    "FERN_TOKEN",
    "NPM_CONFIG_PREFIX",
    "npm_config_prefix",
];

/// SIGTERM → SIGKILL grace
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How long to wait for pipe readers after the child is gone
const DRAIN_GRACE: Duration = Duration::from_secs(1);

const READ_CHUNK: usize = 8 * 1024;

/// How the external tool is located, installed and run
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub program: String,
    /// argv proving the tool's runtime is present
    pub runtime_check: Vec<String>,
    /// argv installing the pinned version; `{version}` is substituted
    pub install: Vec<String>,
    pub cli_version: String,
    pub timeout: Option<Duration>,
    pub max_capture_bytes: usize,
    /// Mirror tool output to the service log at debug level
    pub verbose: bool,
    pub env_allowlist: Vec<String>,
    /// Skip the install memo and run the installer for every job
    pub reinstall_per_job: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_TOOL_PROGRAM.to_string(),
            runtime_check: vec!["node".to_string(), "--version".to_string()],
            install: vec![
                "npm".to_string(),
                "install".to_string(),
                "--global".to_string(),
                format!("fern-api@{}", VERSION_PLACEHOLDER),
            ],
            cli_version: DEFAULT_CLI_VERSION.to_string(),
            timeout: None,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            verbose: false,
            env_allowlist: DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect(),
            reinstall_per_job: false,
        }
    }
}

/// One captured stream
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn into_text(self) -> (String, bool) {
        (String::from_utf8_lossy(&self.bytes).into_owned(), self.truncated)
    }
}

/// Runs the external generator as a child process
///
/// Children start from a cleared environment plus the allowlist, never see a
/// stdin and have both output streams captured up to `max_capture_bytes`.
/// Installs are serialized through a gate that remembers which versions
/// already installed successfully; one invoker is shared by every job of
/// the process, which makes concurrent installs of the same version safe.
pub struct SubprocessToolInvoker {
    settings: ToolSettings,
    time_provider: Arc<dyn TimeProvider>,
    installed: Mutex<HashSet<String>>,
}

impl SubprocessToolInvoker {
    pub fn new(settings: ToolSettings, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            settings,
            time_provider,
            installed: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Allowlisted subset of the service's own environment
    fn filter_env(&self, env: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
        env.filter(|(k, _)| self.settings.env_allowlist.contains(k))
            .collect()
    }

    /// Full argv for a command
    fn argv(&self, command: &ToolCommand, extra_args: &[String]) -> Vec<String> {
        let mut argv: Vec<String> = match command {
            ToolCommand::EnsureAvailable => self.settings.runtime_check.clone(),
            ToolCommand::Install => self
                .settings
                .install
                .iter()
                .map(|arg| arg.replace(VERSION_PLACEHOLDER, &self.settings.cli_version))
                .collect(),
            ToolCommand::Check => vec![self.settings.program.clone(), "check".to_string()],
            ToolCommand::Generate { group } => {
                let mut argv = vec![
                    self.settings.program.clone(),
                    "generate".to_string(),
                    "--local".to_string(),
                ];
                if let Some(group) = group {
                    argv.push("--group".to_string());
                    argv.push(group.clone());
                }
                argv
            }
        };
        argv.extend(extra_args.iter().cloned());
        argv
    }

    async fn install(
        &self,
        working_dir: &Path,
        extra_args: &[String],
    ) -> Result<ToolOutput, InvocationError> {
        let version = self.settings.cli_version.clone();
        let mut installed = self.installed.lock().await;

        if installed.contains(&version) && !self.settings.reinstall_per_job {
            debug!(version = %version, "Tool version already installed, skipping");
            return Ok(ToolOutput::succeeded(format!(
                "{} {} already installed\n",
                self.settings.program, version
            )));
        }

        let argv = self.argv(&ToolCommand::Install, extra_args);
        let output = self.run(working_dir, "install", &argv).await?;
        if output.success() {
            installed.insert(version);
        }
        Ok(output)
    }

    /// Spawn, capture and wait for one child
    async fn run(
        &self,
        working_dir: &Path,
        label: &'static str,
        argv: &[String],
    ) -> Result<ToolOutput, InvocationError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| InvocationError::SpawnFailed(format!("no argv configured for {}", label)))?;

        let start_time = self.time_provider.now_millis();
        info!(
            command = %label,
            program = %program,
            args = ?args,
            working_dir = %working_dir.display(),
            "Starting tool invocation"
        );

        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .env_clear()
            .envs(self.filter_env(std::env::vars()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| InvocationError::SpawnFailed(format!("{}: {}", program, e)))?;

        let limit = self.settings.max_capture_bytes;
        let verbose = self.settings.verbose;
        let stdout = child
            .stdout
            .take()
            .map(|pipe| spawn_job_task(capture(pipe, limit, verbose, "stdout")));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| spawn_job_task(capture(pipe, limit, verbose, "stderr")));

        let waited = match self.settings.timeout {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => Some(status),
                Err(_) => None,
            },
            None => Some(child.wait().await),
        };

        let status = match waited {
            Some(status) => status.map_err(|e| InvocationError::Io(e.to_string()))?,
            None => {
                let timeout_ms = self
                    .settings
                    .timeout
                    .map(|t| t.as_millis() as i64)
                    .unwrap_or_default();
                warn!(command = %label, timeout_ms = %timeout_ms, "Tool invocation timed out");
                let status = kill_graceful(&mut child).await;
                let output = self
                    .collect(status, stdout, stderr, start_time)
                    .await;
                return Err(InvocationError::Timeout {
                    timeout_ms,
                    output: Some(output),
                });
            }
        };

        let output = self.collect(Some(status), stdout, stderr, start_time).await;
        info!(
            command = %label,
            duration_ms = %output.duration_ms,
            exit_code = ?output.exit_code,
            stdout_truncated = output.stdout_truncated,
            stderr_truncated = output.stderr_truncated,
            "Tool invocation completed"
        );
        Ok(output)
    }

    async fn collect(
        &self,
        status: Option<ExitStatus>,
        stdout: Option<JoinHandle<Captured>>,
        stderr: Option<JoinHandle<Captured>>,
        start_time: i64,
    ) -> ToolOutput {
        let (stdout, stdout_truncated) = drain(stdout).await.into_text();
        let (stderr, stderr_truncated) = drain(stderr).await.into_text();
        ToolOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout,
            stderr,
            duration_ms: self.time_provider.now_millis() - start_time,
            stdout_truncated,
            stderr_truncated,
        }
    }
}

/// Read a pipe to EOF, keeping at most `limit` bytes
///
/// Bytes past the limit are still read so the child never blocks on a full
/// pipe.
async fn capture<R>(mut pipe: R, limit: usize, mirror: bool, stream: &'static str) -> Captured
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(stream = %stream, error = %e, "Failed to read tool output");
                break;
            }
        };
        let data = &chunk[..n];

        if mirror {
            for line in String::from_utf8_lossy(data).lines() {
                debug!(stream = %stream, "{}", line);
            }
        }

        let room = limit.saturating_sub(captured.bytes.len());
        if data.len() > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&data[..data.len().min(room)]);
    }

    captured
}

/// Await a capture task, giving up if a grandchild keeps the pipe open
async fn drain(handle: Option<JoinHandle<Captured>>) -> Captured {
    let Some(handle) = handle else {
        return Captured::default();
    };
    let abort = handle.abort_handle();
    match timeout(DRAIN_GRACE, handle).await {
        Ok(Ok(captured)) => captured,
        Ok(Err(e)) => {
            warn!(error = %e, "Output capture task failed");
            Captured::default()
        }
        Err(_) => {
            abort.abort();
            Captured {
                bytes: Vec::new(),
                truncated: true,
            }
        }
    }
}

/// SIGTERM first, SIGKILL if the child outlives the grace period
async fn kill_graceful(child: &mut Child) -> Option<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!(pid = %pid, "Sending SIGTERM to tool process");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                if let Ok(Ok(status)) = timeout(KILL_GRACE, child.wait()).await {
                    return Some(status);
                }
                warn!(pid = %pid, "Tool process did not exit after SIGTERM, sending SIGKILL");
            }
        }
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill tool process");
    }
    child.try_wait().ok().flatten()
}

#[async_trait]
impl ToolInvoker for SubprocessToolInvoker {
    async fn invoke(
        &self,
        working_dir: &Path,
        command: &ToolCommand,
        extra_args: &[String],
    ) -> Result<ToolOutput, InvocationError> {
        match command {
            ToolCommand::Install => self.install(working_dir, extra_args).await,
            other => {
                let argv = self.argv(other, extra_args);
                self.run(working_dir, other.name(), &argv).await
            }
        }
    }
}
