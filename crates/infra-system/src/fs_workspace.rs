// Filesystem workspace manager
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use forge_core::error::{JobError, Result};
use forge_core::port::{TimeProvider, Workspace, WorkspaceManager};

/// Default directory-name prefix for workspaces
pub const DEFAULT_WORKSPACE_PREFIX: &str = "forge-job-";

/// Attempts before giving up on a name collision
const MAX_ALLOCATE_ATTEMPTS: usize = 3;

/// Allocates `<root>/<prefix><epoch-ms>-<seq>-<random>` directories
///
/// The timestamp, a process-wide sequence and a random component make names
/// unique across concurrent jobs and across restarts; `create_dir` (not
/// `create_dir_all`) turns any residual collision into a retry.
pub struct FsWorkspaceManager {
    root: PathBuf,
    prefix: String,
    time_provider: Arc<dyn TimeProvider>,
    sequence: AtomicU64,
}

impl FsWorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::with_prefix(root, DEFAULT_WORKSPACE_PREFIX, time_provider)
    }

    pub fn with_prefix(
        root: impl Into<PathBuf>,
        prefix: impl Into<String>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
            time_provider,
            sequence: AtomicU64::new(0),
        }
    }

    fn next_name(&self, now_millis: i64) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let random = uuid::Uuid::new_v4().simple().to_string();
        format!("{}{}-{}-{}", self.prefix, now_millis, seq, &random[..8])
    }

    /// Allocation timestamp encoded in a workspace directory name
    fn parse_created_at(&self, name: &str) -> Option<i64> {
        name.strip_prefix(&self.prefix)?
            .split('-')
            .next()?
            .parse()
            .ok()
    }

    /// Only direct children of the root carrying our prefix may be removed
    fn owns(&self, path: &Path) -> bool {
        path.parent() == Some(self.root.as_path())
            && path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with(&self.prefix))
                .unwrap_or(false)
    }
}

impl WorkspaceManager for FsWorkspaceManager {
    fn allocate(&self) -> Result<Workspace> {
        fs::create_dir_all(&self.root).map_err(|e| {
            JobError::resource(format!("create workspace root {}", self.root.display()), e)
        })?;

        for _ in 0..MAX_ALLOCATE_ATTEMPTS {
            let now = self.time_provider.now_millis();
            let path = self.root.join(self.next_name(now));
            match fs::create_dir(&path) {
                Ok(()) => {
                    debug!(workspace = %path.display(), "Workspace allocated");
                    return Ok(Workspace::new(path, now));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(workspace = %path.display(), "Workspace name collision, retrying");
                }
                Err(e) => {
                    return Err(JobError::resource(
                        format!("create workspace {}", path.display()),
                        e,
                    ))
                }
            }
        }

        Err(JobError::Resource(format!(
            "could not allocate a unique workspace under {} after {} attempts",
            self.root.display(),
            MAX_ALLOCATE_ATTEMPTS
        )))
    }

    fn release(&self, workspace: &Workspace) -> Result<()> {
        if !self.owns(&workspace.root) {
            return Err(JobError::Resource(format!(
                "refusing to remove {}: not a workspace under {}",
                workspace.root.display(),
                self.root.display()
            )));
        }

        match fs::remove_dir_all(&workspace.root) {
            Ok(()) => {
                debug!(workspace = %workspace.root.display(), "Workspace released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JobError::resource(
                format!("remove workspace {}", workspace.root.display()),
                e,
            )),
        }
    }

    fn list(&self) -> Result<Vec<Workspace>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(JobError::resource(
                    format!("list workspace root {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut workspaces = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| JobError::resource("read workspace entry", e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(created_at) = self.parse_created_at(&name) {
                workspaces.push(Workspace::new(entry.path(), created_at));
            }
        }
        Ok(workspaces)
    }

    fn root(&self) -> &Path {
        &self.root
    }
}
