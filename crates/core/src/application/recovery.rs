// Crash recovery: remove workspaces left behind by a previous process
use crate::error::Result;
use crate::port::{TimeProvider, WorkspaceManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::application::orchestrator::constants::DEFAULT_ORPHAN_AGE;

/// Crash recovery service
///
/// A crash between allocation and release leaves a workspace on disk. On
/// startup, any workspace older than the orphan window cannot belong to a
/// live job and is removed.
pub struct RecoveryService {
    workspaces: Arc<dyn WorkspaceManager>,
    time_provider: Arc<dyn TimeProvider>,
    orphan_age_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `workspaces` - Workspace manager whose root is swept
    /// * `time_provider` - Time provider
    /// * `orphan_age` - Optional custom window (default: 1 hour)
    pub fn new(
        workspaces: Arc<dyn WorkspaceManager>,
        time_provider: Arc<dyn TimeProvider>,
        orphan_age: Option<Duration>,
    ) -> Self {
        Self {
            workspaces,
            time_provider,
            orphan_age_ms: orphan_age.unwrap_or(DEFAULT_ORPHAN_AGE).as_millis() as i64,
        }
    }

    /// Remove orphaned workspaces
    ///
    /// # Returns
    /// Number of workspaces removed
    pub fn sweep_orphaned_workspaces(&self) -> Result<usize> {
        let cutoff = self.time_provider.now_millis() - self.orphan_age_ms;

        info!(
            root = %self.workspaces.root().display(),
            cutoff = %cutoff,
            "Sweeping orphaned workspaces"
        );

        let mut removed = 0;
        for workspace in self.workspaces.list()? {
            if workspace.created_at >= cutoff {
                continue;
            }
            match self.workspaces.release(&workspace) {
                Ok(()) => {
                    info!(workspace = %workspace.root.display(), "Removed orphaned workspace");
                    removed += 1;
                }
                Err(e) => {
                    error!(
                        workspace = %workspace.root.display(),
                        error = %e,
                        "Failed to remove orphaned workspace"
                    );
                }
            }
        }

        info!(removed = %removed, "Orphaned workspace sweep complete");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::time_provider::FixedTimeProvider;
    use crate::port::Workspace;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    struct ListedWorkspaces {
        root: PathBuf,
        listed: Vec<Workspace>,
        released: Mutex<Vec<PathBuf>>,
    }

    impl WorkspaceManager for ListedWorkspaces {
        fn allocate(&self) -> Result<Workspace> {
            unreachable!("sweep never allocates")
        }

        fn release(&self, workspace: &Workspace) -> Result<()> {
            self.released.lock().unwrap().push(workspace.root.clone());
            Ok(())
        }

        fn list(&self) -> Result<Vec<Workspace>> {
            Ok(self.listed.clone())
        }

        fn root(&self) -> &Path {
            &self.root
        }
    }

    #[test]
    fn test_sweep_removes_only_old_workspaces() {
        let manager = Arc::new(ListedWorkspaces {
            root: PathBuf::from("/tmp/forge"),
            listed: vec![
                Workspace::new(PathBuf::from("/tmp/forge/old"), 1_000),
                Workspace::new(PathBuf::from("/tmp/forge/fresh"), 9_500),
            ],
            released: Mutex::new(Vec::new()),
        });

        let service = RecoveryService::new(
            manager.clone(),
            Arc::new(FixedTimeProvider(10_000)),
            Some(Duration::from_secs(1)),
        );

        assert_eq!(service.sweep_orphaned_workspaces().unwrap(), 1);
        assert_eq!(
            *manager.released.lock().unwrap(),
            vec![PathBuf::from("/tmp/forge/old")]
        );
    }
}
