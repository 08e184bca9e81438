// Orchestrator constants (No magic values)
use std::time::Duration;

/// Content type of packaged archives
pub const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

/// Package name used for validate jobs that did not send one
pub const DEFAULT_VALIDATE_PACKAGE: &str = "api";

/// Extra generator arguments in verbose mode
pub const VERBOSE_TOOL_ARGS: [&str; 2] = ["--log-level", "debug"];

/// Workspaces older than this are considered orphaned by the startup sweep
/// (no job lives this long)
pub const DEFAULT_ORPHAN_AGE: Duration = Duration::from_secs(60 * 60);

/// Grace delay before the process exits on an unhandled fault
pub const FATAL_EXIT_GRACE: Duration = Duration::from_millis(500);
