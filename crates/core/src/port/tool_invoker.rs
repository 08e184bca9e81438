// Tool Invoker Port
// Abstraction for running the external generator as a subprocess

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// What to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    /// Verify the tool's runtime is present
    EnsureAvailable,
    /// Install the pinned tool version (idempotent)
    Install,
    /// Tool-native validation of the materialized project
    Check,
    /// Code generation, optionally scoped to one generator group
    Generate { group: Option<String> },
}

impl ToolCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCommand::EnsureAvailable => "ensure-available",
            ToolCommand::Install => "install",
            ToolCommand::Check => "check",
            ToolCommand::Generate { .. } => "generate",
        }
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Captured result of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: i64,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 0,
            stdout_truncated: false,
            stderr_truncated: false,
        }
    }

    pub fn failed(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration_ms: 0,
            stdout_truncated: false,
            stderr_truncated: false,
        }
    }
}

/// Invocation errors (the process could not be run to completion)
///
/// A non-zero exit is NOT an error at this level; it is a `ToolOutput`
/// whose `success()` is false.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process timeout after {timeout_ms}ms")]
    Timeout {
        timeout_ms: i64,
        output: Option<ToolOutput>,
    },

    #[error("IO error: {0}")]
    Io(String),
}

/// Tool Invoker trait
///
/// Implementations run synchronously relative to the job (the caller
/// awaits completion), never read stdin and never retry.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run `command` with `working_dir` as the current directory
    ///
    /// # Errors
    /// - InvocationError::SpawnFailed if the program cannot be started
    /// - InvocationError::Timeout if the configured limit elapses
    async fn invoke(
        &self,
        working_dir: &Path,
        command: &ToolCommand,
        extra_args: &[String],
    ) -> Result<ToolOutput, InvocationError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Mock invoker behavior for one command
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit 0 with stdout
        Succeed(String),
        /// Exit with code and stderr
        Exit(i32, String),
        /// Cannot spawn
        SpawnFail(String),
        /// Exit 0 after writing files into the workspace (relative path, contents)
        WriteFiles(Vec<(PathBuf, String)>),
        /// Panic (for task isolation testing)
        Panic(String),
    }

    /// Recorded call
    #[derive(Debug, Clone)]
    pub struct MockCall {
        pub working_dir: PathBuf,
        pub command: ToolCommand,
        pub extra_args: Vec<String>,
    }

    /// Mock Tool Invoker; commands without a configured behavior succeed
    #[derive(Default)]
    pub struct MockToolInvoker {
        behaviors: Mutex<HashMap<&'static str, MockBehavior>>,
        calls: Arc<Mutex<Vec<MockCall>>>,
    }

    impl MockToolInvoker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, command: &'static str, behavior: MockBehavior) -> Self {
            self.behaviors.lock().unwrap().insert(command, behavior);
            self
        }

        pub fn calls(&self) -> Vec<MockCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn commands(&self) -> Vec<&'static str> {
            self.calls().iter().map(|c| c.command.name()).collect()
        }
    }

    #[async_trait]
    impl ToolInvoker for MockToolInvoker {
        async fn invoke(
            &self,
            working_dir: &Path,
            command: &ToolCommand,
            extra_args: &[String],
        ) -> Result<ToolOutput, InvocationError> {
            self.calls.lock().unwrap().push(MockCall {
                working_dir: working_dir.to_path_buf(),
                command: command.clone(),
                extra_args: extra_args.to_vec(),
            });

            let behavior = self.behaviors.lock().unwrap().get(command.name()).cloned();

            match behavior {
                None => Ok(ToolOutput::succeeded("ok")),
                Some(MockBehavior::Succeed(stdout)) => Ok(ToolOutput::succeeded(stdout)),
                Some(MockBehavior::Exit(code, stderr)) => {
                    Ok(ToolOutput::failed(code, String::new(), stderr))
                }
                Some(MockBehavior::SpawnFail(msg)) => Err(InvocationError::SpawnFailed(msg)),
                Some(MockBehavior::WriteFiles(files)) => {
                    for (rel, contents) in files {
                        let path = working_dir.join(rel);
                        if let Some(parent) = path.parent() {
                            std::fs::create_dir_all(parent)
                                .map_err(|e| InvocationError::Io(e.to_string()))?;
                        }
                        std::fs::write(&path, contents)
                            .map_err(|e| InvocationError::Io(e.to_string()))?;
                    }
                    Ok(ToolOutput::succeeded("generated"))
                }
                Some(MockBehavior::Panic(msg)) => {
                    panic!("{}", msg);
                }
            }
        }
    }
}
