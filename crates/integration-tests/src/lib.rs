//! End-to-end harness: real adapters, scripted generator
//!
//! The fake tool honours the same contract as the real CLI: it is run from
//! the workspace root, reads `fern/generators.yml` and writes to the output
//! path declared there. Markers in the uploaded spec steer it:
//! - `MALFORMED`: `check` fails with a coloured error on stderr
//! - `FAIL_GENERATE`: `generate` exits 1
//! - `NO_OUTPUT`: `generate` exits 0 without writing anything
//! - `SLOW_GENERATE`: `generate` sleeps briefly first

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forge_core::application::{JobOrchestrator, OrchestratorConfig};
use forge_core::domain::InputSpec;
use forge_core::error::Result;
use forge_core::port::{Workspace, WorkspaceManager};
use forge_core::port::id_provider::UuidProvider;
use forge_core::port::time_provider::SystemTimeProvider;
use forge_infra_system::{
    FsProjectMaterializer, FsWorkspaceManager, ProjectIdentity, SubprocessToolInvoker,
    TarGzPackager, ToolSettings, DEFAULT_WORKSPACE_PREFIX,
};

const FAKE_TOOL: &str = r#"#!/bin/sh
cmd="$1"
shift
spec="fern/openapi/openapi.yml"

for f in fern/fern.config.json fern/generators.yml "$spec"; do
    if [ ! -f "$f" ]; then
        echo "missing $f" >&2
        exit 2
    fi
done

case "$cmd" in
    check)
        if grep -q MALFORMED "$spec"; then
            printf '\033[31merror\033[0m: %s is not a valid OpenAPI document\n' "$spec" >&2
            printf '\n  at paths./pets.get: missing responses\n' >&2
            exit 1
        fi
        echo "Found 0 errors and 0 warnings"
        ;;
    generate)
        group=""
        while [ $# -gt 0 ]; do
            case "$1" in
                --group) group="$2"; shift 2 ;;
                *) shift ;;
            esac
        done
        if grep -q SLOW_GENERATE "$spec"; then
            sleep 1
        fi
        if grep -q FAIL_GENERATE "$spec"; then
            echo "Generating $group..."
            echo "generation failed: unsupported schema type" >&2
            exit 1
        fi
        if grep -q NO_OUTPUT "$spec"; then
            echo "Nothing to generate"
            exit 0
        fi
        out=$(grep 'path:' fern/generators.yml | head -n 1 | sed 's/.*path: *//')
        target="fern/$out"
        mkdir -p "$target/src"
        cp fern/generators.yml "$target/generators.snapshot.yml"
        echo "// $group client" > "$target/src/client.txt"
        echo "Generated $group SDK into $out"
        ;;
    *)
        echo "unknown command $cmd" >&2
        exit 64
        ;;
esac
"#;

/// Directory holding the fake tool for this test binary
static FAKE_TOOL_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
    let dir = tempfile::tempdir().expect("create fake tool dir");
    let path = dir.path().join("fern");
    // Written by a child process so no writable descriptor to the script is
    // ever open in this (multi-threaded, forking) process.
    let status = std::process::Command::new("/bin/sh")
        .arg("-c")
        .arg("printf '%s' \"$1\" > \"$2\" && chmod 755 \"$2\"")
        .arg("write-fake-tool")
        .arg(FAKE_TOOL)
        .arg(&path)
        .status()
        .expect("write fake tool");
    assert!(status.success(), "failed to write fake tool");
    dir
});

pub fn fake_tool_path() -> PathBuf {
    FAKE_TOOL_DIR.path().join("fern")
}

/// Tool settings pointing at the fake generator
pub fn fake_tool_settings() -> ToolSettings {
    ToolSettings {
        program: fake_tool_path().display().to_string(),
        runtime_check: sh("exit 0"),
        install: sh("echo installed fern-api@{version}"),
        timeout: Some(Duration::from_secs(30)),
        ..ToolSettings::default()
    }
}

pub fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Filesystem workspaces that remember every path they handed out
pub struct RecordingWorkspaces {
    inner: FsWorkspaceManager,
    allocated: Mutex<Vec<PathBuf>>,
}

impl RecordingWorkspaces {
    pub fn new(inner: FsWorkspaceManager) -> Self {
        Self {
            inner,
            allocated: Mutex::new(Vec::new()),
        }
    }

    pub fn allocated(&self) -> Vec<PathBuf> {
        self.allocated.lock().expect("allocation log").clone()
    }
}

impl WorkspaceManager for RecordingWorkspaces {
    fn allocate(&self) -> Result<Workspace> {
        let workspace = self.inner.allocate()?;
        self.allocated
            .lock()
            .expect("allocation log")
            .push(workspace.root.clone());
        Ok(workspace)
    }

    fn release(&self, workspace: &Workspace) -> Result<()> {
        self.inner.release(workspace)
    }

    fn list(&self) -> Result<Vec<Workspace>> {
        self.inner.list()
    }

    fn root(&self) -> &Path {
        self.inner.root()
    }
}

/// Orchestrator wired to real adapters under a private temp root
pub struct Harness {
    pub root: tempfile::TempDir,
    pub workspaces: Arc<RecordingWorkspaces>,
    pub orchestrator: Arc<JobOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(fake_tool_settings())
    }

    pub fn with_settings(settings: ToolSettings) -> Self {
        let root = tempfile::tempdir().expect("create workspace root");
        let time_provider = Arc::new(SystemTimeProvider);
        let workspaces = Arc::new(RecordingWorkspaces::new(FsWorkspaceManager::new(
            root.path(),
            time_provider.clone(),
        )));
        let orchestrator = JobOrchestrator::new(
            workspaces.clone(),
            Arc::new(FsProjectMaterializer::new(ProjectIdentity::new(
                "forge-tests",
                settings.cli_version.clone(),
            ))),
            Arc::new(SubprocessToolInvoker::new(settings, time_provider.clone())),
            Arc::new(TarGzPackager::new()),
            Arc::new(UuidProvider),
            time_provider,
            OrchestratorConfig::default(),
        );
        Self {
            root,
            workspaces,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Workspace directories still on disk
    pub fn residue(&self) -> Vec<PathBuf> {
        workspace_dirs(self.root.path())
    }

    /// Every workspace path allocated so far, in allocation order
    pub fn allocated(&self) -> Vec<PathBuf> {
        self.workspaces.allocated()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn workspace_dirs(root: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with(DEFAULT_WORKSPACE_PREFIX))
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default()
}

pub const PETSTORE: &str = r#"openapi: 3.0.0
info:
  title: Petstore
  version: 1.0.0
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        "200":
          description: OK
"#;

pub fn spec(contents: &str) -> InputSpec {
    InputSpec::new(Some("openapi.yml".to_string()), contents)
}

/// Spec carrying a fake-tool marker
pub fn marked_spec(marker: &str) -> InputSpec {
    spec(&format!("{}# {}\n", PETSTORE, marker))
}

/// Archive entry paths and contents
pub fn unpack(archive: &[u8]) -> Vec<(String, String)> {
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));
    let mut files = Vec::new();
    for entry in tar.entries().expect("read archive") {
        let mut entry = entry.expect("archive entry");
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let path = entry.path().expect("entry path").display().to_string();
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut entry, &mut contents).expect("entry contents");
        files.push((path, contents));
    }
    files
}

/// Parsed generators.yml the fake tool saw
pub fn generators_snapshot(archive: &[u8], language: &str) -> serde_yaml::Value {
    let name = format!("{}/generators.snapshot.yml", language);
    let (_, contents) = unpack(archive)
        .into_iter()
        .find(|(path, _)| *path == name)
        .unwrap_or_else(|| panic!("{} not in archive", name));
    serde_yaml::from_str(&contents).expect("snapshot yaml")
}
