//! Startup sweep of workspaces left behind by a crashed process

use std::sync::Arc;
use std::time::Duration;

use forge_core::application::RecoveryService;
use forge_core::port::time_provider::{FixedTimeProvider, SystemTimeProvider};
use forge_core::port::{TimeProvider, WorkspaceManager};
use forge_infra_system::FsWorkspaceManager;
use forge_integration_tests::workspace_dirs;

const HOUR_MS: i64 = 60 * 60 * 1000;

#[test]
fn test_sweep_removes_orphans_and_keeps_fresh_workspaces() {
    let root = tempfile::tempdir().unwrap();
    let now = SystemTimeProvider.now_millis();

    // a previous process allocated this two hours ago and died mid-job
    let crashed =
        FsWorkspaceManager::new(root.path(), Arc::new(FixedTimeProvider(now - 2 * HOUR_MS)));
    let orphan = crashed.allocate().unwrap();
    std::fs::create_dir_all(orphan.root.join("fern/openapi")).unwrap();
    std::fs::write(orphan.root.join("fern/openapi/openapi.yml"), "openapi: 3.0.0").unwrap();

    let live = FsWorkspaceManager::new(root.path(), Arc::new(FixedTimeProvider(now)));
    let fresh = live.allocate().unwrap();

    // unrelated content under the root is never touched
    std::fs::create_dir(root.path().join("not-a-workspace")).unwrap();

    let recovery = RecoveryService::new(
        Arc::new(live),
        Arc::new(FixedTimeProvider(now)),
        Some(Duration::from_secs(60 * 60)),
    );
    assert_eq!(recovery.sweep_orphaned_workspaces().unwrap(), 1);

    assert!(!orphan.root.exists());
    assert!(fresh.root.exists());
    assert!(root.path().join("not-a-workspace").exists());
    assert_eq!(workspace_dirs(root.path()), vec![fresh.root.clone()]);
}

#[test]
fn test_sweep_of_missing_root_is_a_no_op() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("never-created");

    let recovery = RecoveryService::new(
        Arc::new(FsWorkspaceManager::new(&missing, Arc::new(SystemTimeProvider))),
        Arc::new(SystemTimeProvider),
        None,
    );

    assert_eq!(recovery.sweep_orphaned_workspaces().unwrap(), 0);
}
