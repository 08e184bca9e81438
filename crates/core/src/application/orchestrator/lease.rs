// Workspace lease - release exactly once, even on panic

use std::sync::Arc;
use tracing::{error, warn};

use crate::error::{JobError, Result};
use crate::port::{Workspace, WorkspaceManager};

/// Ownership of one allocated workspace
///
/// `release` is the normal path. If the lease is dropped unreleased (the job
/// task unwound), the workspace is removed synchronously in `Drop`.
pub struct WorkspaceLease {
    manager: Arc<dyn WorkspaceManager>,
    workspace: Workspace,
    released: bool,
}

impl WorkspaceLease {
    pub fn new(manager: Arc<dyn WorkspaceManager>, workspace: Workspace) -> Self {
        Self {
            manager,
            workspace,
            released: false,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Remove the workspace on the blocking pool
    pub async fn release(mut self) -> Result<()> {
        self.released = true;

        let manager = Arc::clone(&self.manager);
        let workspace = self.workspace.clone();
        match super::spawn_job_blocking(move || manager.release(&workspace)).await {
            Ok(result) => result,
            Err(join_err) => {
                warn!(
                    workspace = %self.workspace.root.display(),
                    error = %join_err,
                    "Release task failed, releasing inline"
                );
                self.manager.release(&self.workspace).map_err(|e| {
                    JobError::Internal(format!("workspace release failed twice: {}", e))
                })
            }
        }
    }
}

impl Drop for WorkspaceLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            workspace = %self.workspace.root.display(),
            "Workspace lease dropped without release, cleaning up"
        );
        if let Err(e) = self.manager.release(&self.workspace) {
            error!(
                workspace = %self.workspace.root.display(),
                error = %e,
                "Failed to release workspace on drop"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::workspace::mocks::MockWorkspaceManager;

    #[tokio::test]
    async fn test_release_removes_once() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(MockWorkspaceManager::new(root.path()));
        let workspace = manager.allocate().unwrap();
        let path = workspace.root.clone();

        let lease = WorkspaceLease::new(manager.clone(), workspace);
        lease.release().await.unwrap();

        assert!(!path.exists());
        assert_eq!(manager.released(), vec![path]);
    }

    #[tokio::test]
    async fn test_drop_without_release_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(MockWorkspaceManager::new(root.path()));
        let workspace = manager.allocate().unwrap();
        let path = workspace.root.clone();

        {
            let _lease = WorkspaceLease::new(manager.clone(), workspace);
        }

        assert!(!path.exists());
        assert_eq!(manager.released().len(), 1);
    }

    #[test]
    fn test_release_from_blocking_context() {
        let root = tempfile::tempdir().unwrap();
        let manager = Arc::new(MockWorkspaceManager::new(root.path()));
        let workspace = manager.allocate().unwrap();
        let path = workspace.root.clone();

        let lease = WorkspaceLease::new(manager.clone(), workspace);
        tokio_test::block_on(lease.release()).unwrap();

        assert!(!path.exists());
        assert_eq!(manager.released(), vec![path]);
    }
}
