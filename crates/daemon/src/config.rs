//! Service configuration
//!
//! Precedence (lowest first): built-in defaults, the user config file
//! (`<config dir>/sdk-forge/config.toml`, if present), `--config` /
//! `FORGE_CONFIG`, then `FORGE_<SECTION>__<KEY>` environment variables.
//! List values in the environment are comma separated.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use forge_api_http::server::{DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT};
use forge_api_http::ServerConfig;
use forge_infra_system::subprocess_invoker::DEFAULT_MAX_CAPTURE_BYTES;
use forge_infra_system::{ProjectIdentity, ToolSettings, DEFAULT_ORGANIZATION, DEFAULT_WORKSPACE_PREFIX};

const ENV_PREFIX: &str = "FORGE";
const LIST_KEYS: &[&str] = &["tool.runtime_check", "tool.install", "tool.env_allowlist"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub server: ServerSection,
    pub workspace: WorkspaceSection,
    pub tool: ToolSection,
    pub project: ProjectSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Required on job endpoints when set
    pub api_key: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    pub root: PathBuf,
    pub prefix: String,
    pub sweep_on_startup: bool,
    /// Age after which a leftover workspace is swept
    pub orphan_age_secs: Option<u64>,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir(),
            prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
            sweep_on_startup: true,
            orphan_age_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSection {
    pub program: String,
    pub runtime_check: Vec<String>,
    pub install: Vec<String>,
    pub cli_version: String,
    pub timeout_secs: Option<u64>,
    pub max_capture_bytes: usize,
    pub verbose: bool,
    pub env_allowlist: Vec<String>,
    pub reinstall_per_job: bool,
}

impl Default for ToolSection {
    fn default() -> Self {
        let tool = ToolSettings::default();
        Self {
            program: tool.program,
            runtime_check: tool.runtime_check,
            install: tool.install,
            cli_version: tool.cli_version,
            timeout_secs: None,
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            verbose: false,
            env_allowlist: tool.env_allowlist,
            reinstall_per_job: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub organization: String,
    /// Defaults to the pinned tool version
    pub version: Option<String>,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            organization: DEFAULT_ORGANIZATION.to_string(),
            version: None,
        }
    }
}

/// Per-user config file, if the platform has a config directory
pub fn user_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "sdk-forge", "sdk-forge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl ForgeConfig {
    /// Load configuration from all sources
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_from(user_config_file().as_deref(), explicit, Some(ENV_PREFIX))
    }

    fn load_from(
        user_file: Option<&Path>,
        explicit: Option<&Path>,
        env_prefix: Option<&str>,
    ) -> Result<Self> {
        let defaults =
            Config::try_from(&ForgeConfig::default()).context("Failed to encode defaults")?;
        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = user_file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        if let Some(prefix) = env_prefix {
            let mut env = Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .try_parsing(true);
            for key in LIST_KEYS {
                env = env.with_list_parse_key(key);
            }
            builder = builder.add_source(env);
        }

        builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            max_upload_bytes: self.server.max_upload_bytes,
        }
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            program: self.tool.program.clone(),
            runtime_check: self.tool.runtime_check.clone(),
            install: self.tool.install.clone(),
            cli_version: self.tool.cli_version.clone(),
            timeout: self.tool.timeout_secs.map(Duration::from_secs),
            max_capture_bytes: self.tool.max_capture_bytes,
            verbose: self.tool.verbose,
            env_allowlist: self.tool.env_allowlist.clone(),
            reinstall_per_job: self.tool.reinstall_per_job,
        }
    }

    pub fn project_identity(&self) -> ProjectIdentity {
        ProjectIdentity::new(
            self.project.organization.clone(),
            self.project
                .version
                .clone()
                .unwrap_or_else(|| self.tool.cli_version.clone()),
        )
    }

    pub fn orphan_age(&self) -> Option<Duration> {
        self.workspace.orphan_age_secs.map(Duration::from_secs)
    }

    /// Reject settings that would only fail later, mid-job
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.tool.program.trim().is_empty(), "tool.program is empty");
        anyhow::ensure!(!self.tool.runtime_check.is_empty(), "tool.runtime_check is empty");
        anyhow::ensure!(!self.tool.install.is_empty(), "tool.install is empty");
        anyhow::ensure!(self.tool.max_capture_bytes > 0, "tool.max_capture_bytes must be positive");
        anyhow::ensure!(!self.workspace.prefix.is_empty(), "workspace.prefix is empty");
        anyhow::ensure!(
            self.server.api_key.as_deref().map_or(true, |k| !k.is_empty()),
            "server.api_key is set but empty"
        );
        Ok(())
    }
}
