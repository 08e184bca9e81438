// tar.gz artifact packager
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use forge_core::application::spawn_job_blocking;
use forge_core::port::{Archive, ArtifactPackager, PackagingError, Workspace};

pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Packs generator output into `<workspace>/<subdir-name>.tar.gz`
///
/// Entries are rooted at the output directory's own name, so
/// `sdks/python/src/client.py` is stored as `python/src/client.py`.
#[derive(Debug, Default, Clone)]
pub struct TarGzPackager;

impl TarGzPackager {
    pub fn new() -> Self {
        Self
    }

    fn pack_blocking(workspace_root: PathBuf, output_subdir: PathBuf) -> Result<Archive, PackagingError> {
        let source = workspace_root.join(&output_subdir);
        if !source.is_dir() {
            return Err(PackagingError::MissingOutput(source));
        }

        let file_count = count_files(&source)?;
        if file_count == 0 {
            return Err(PackagingError::EmptyOutput(source));
        }

        let root_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let path = workspace_root.join(format!("{}.{}", root_name, ARCHIVE_EXTENSION));

        let file = fs::File::create(&path)
            .map_err(|e| PackagingError::Io(format!("create {}: {}", path.display(), e)))?;
        let encoder = GzEncoder::new(file, Compression::best());
        let mut tar = tar::Builder::new(encoder);
        tar.follow_symlinks(false);
        tar.append_dir_all(&root_name, &source)
            .map_err(|e| PackagingError::Io(format!("add {}: {}", source.display(), e)))?;
        tar.into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| PackagingError::Io(format!("finalize {}: {}", path.display(), e)))?;

        let size_bytes = fs::metadata(&path)
            .map_err(|e| PackagingError::Io(e.to_string()))?
            .len();

        info!(
            archive = %path.display(),
            size_bytes = %size_bytes,
            files = %file_count,
            "Output packaged"
        );

        Ok(Archive {
            path,
            extension: ARCHIVE_EXTENSION,
            size_bytes,
            file_count,
        })
    }
}

/// Regular files (and symlinks) anywhere below `dir`
fn count_files(dir: &Path) -> Result<usize, PackagingError> {
    let mut count = 0;
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| PackagingError::Io(e.to_string()))?;
        if !entry.file_type().is_dir() {
            count += 1;
        }
    }
    Ok(count)
}

#[async_trait]
impl ArtifactPackager for TarGzPackager {
    async fn pack(
        &self,
        workspace: &Workspace,
        output_subdir: &Path,
    ) -> Result<Archive, PackagingError> {
        let root = workspace.root.clone();
        let subdir = output_subdir.to_path_buf();
        spawn_job_blocking(move || Self::pack_blocking(root, subdir))
            .await
            .map_err(|e| PackagingError::Io(format!("packaging task failed: {}", e)))?
    }
}
