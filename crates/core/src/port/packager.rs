// Artifact Packager Port

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::port::workspace::Workspace;

/// Packaged generator output
#[derive(Debug, Clone)]
pub struct Archive {
    pub path: PathBuf,
    /// File extension without the leading dot (e.g. `tar.gz`)
    pub extension: &'static str,
    pub size_bytes: u64,
    pub file_count: usize,
}

/// Packaging errors
///
/// `MissingOutput` and `EmptyOutput` are distinct on purpose: a zero exit
/// code is necessary but not sufficient proof of a usable result.
#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("generator output directory does not exist: {0}")]
    MissingOutput(PathBuf),

    #[error("generator output directory is empty: {0}")]
    EmptyOutput(PathBuf),

    #[error("archive creation failed: {0}")]
    Io(String),
}

/// Artifact Packager trait
#[async_trait]
pub trait ArtifactPackager: Send + Sync {
    /// Archive `output_subdir` (relative to the workspace root) into a single
    /// compressed file inside the workspace
    ///
    /// # Errors
    /// - PackagingError::MissingOutput if the directory does not exist
    /// - PackagingError::EmptyOutput if it contains no files
    async fn pack(
        &self,
        workspace: &Workspace,
        output_subdir: &Path,
    ) -> Result<Archive, PackagingError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Checks the output directory like a real packager, then writes a
    /// placeholder archive next to it
    #[derive(Default)]
    pub struct MockArtifactPackager;

    #[async_trait]
    impl ArtifactPackager for MockArtifactPackager {
        async fn pack(
            &self,
            workspace: &Workspace,
            output_subdir: &Path,
        ) -> Result<Archive, PackagingError> {
            let dir = workspace.path().join(output_subdir);
            if !dir.is_dir() {
                return Err(PackagingError::MissingOutput(dir));
            }
            let file_count = std::fs::read_dir(&dir)
                .map_err(|e| PackagingError::Io(e.to_string()))?
                .count();
            if file_count == 0 {
                return Err(PackagingError::EmptyOutput(dir));
            }

            let path = workspace.path().join("mock-archive.tar.gz");
            std::fs::write(&path, b"archive").map_err(|e| PackagingError::Io(e.to_string()))?;
            Ok(Archive {
                path,
                extension: "tar.gz",
                size_bytes: 7,
                file_count,
            })
        }
    }
}
