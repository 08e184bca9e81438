// Workspace Manager Port
// Pure directory lifecycle: allocate unique directories, remove them once

use std::path::{Path, PathBuf};

use crate::error::Result;

/// One allocated workspace directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    /// Allocation time in epoch ms (encoded in the directory name)
    pub created_at: i64,
}

impl Workspace {
    pub fn new(root: PathBuf, created_at: i64) -> Self {
        Self { root, created_at }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Workspace Manager trait
///
/// Does not know about jobs. Operations are short, blocking filesystem
/// calls; callers on an async runtime should use `spawn_blocking` for
/// `release`, which may walk a large tree.
pub trait WorkspaceManager: Send + Sync {
    /// Create a new directory, unique among all live workspaces
    ///
    /// # Errors
    /// - JobError::Resource if the root is not writable
    fn allocate(&self) -> Result<Workspace>;

    /// Recursively remove a workspace
    ///
    /// Idempotent: releasing an already-removed workspace is a no-op.
    fn release(&self, workspace: &Workspace) -> Result<()>;

    /// Workspaces currently present under the root (including ones left
    /// behind by a previous process)
    fn list(&self) -> Result<Vec<Workspace>>;

    /// Root all workspaces are allocated under
    fn root(&self) -> &Path;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::JobError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Real directories under `root`, with call accounting
    pub struct MockWorkspaceManager {
        root: PathBuf,
        counter: AtomicU64,
        released: Mutex<Vec<PathBuf>>,
        fail_allocate: bool,
    }

    impl MockWorkspaceManager {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                counter: AtomicU64::new(1),
                released: Mutex::new(Vec::new()),
                fail_allocate: false,
            }
        }

        pub fn failing(root: impl Into<PathBuf>) -> Self {
            Self {
                fail_allocate: true,
                ..Self::new(root)
            }
        }

        /// Paths passed to `release`, in call order
        pub fn released(&self) -> Vec<PathBuf> {
            self.released.lock().unwrap().clone()
        }

        pub fn allocated_count(&self) -> u64 {
            self.counter.load(Ordering::SeqCst) - 1
        }
    }

    impl WorkspaceManager for MockWorkspaceManager {
        fn allocate(&self) -> Result<Workspace> {
            if self.fail_allocate {
                return Err(JobError::Resource("mock root not writable".to_string()));
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let root = self.root.join(format!("ws-{}", n));
            std::fs::create_dir_all(&root).map_err(|e| JobError::resource("mock allocate", e))?;
            Ok(Workspace::new(root, n as i64))
        }

        fn release(&self, workspace: &Workspace) -> Result<()> {
            self.released.lock().unwrap().push(workspace.root.clone());
            match std::fs::remove_dir_all(&workspace.root) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(JobError::resource("mock release", e)),
            }
        }

        fn list(&self) -> Result<Vec<Workspace>> {
            Ok(Vec::new())
        }

        fn root(&self) -> &Path {
            &self.root
        }
    }
}
