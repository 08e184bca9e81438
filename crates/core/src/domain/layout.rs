// On-disk project layout expected by the external generator
//
// <workspace>/
//   fern/
//     fern.config.json      project identity (organization, version)
//     generators.yml        generator configuration
//     openapi/openapi.yml   caller's input spec
//   sdks/<language>/        generator output

use serde::Serialize;
use std::path::{Path, PathBuf};

pub const PROJECT_DIR: &str = "fern";
pub const SPEC_DIR: &str = "openapi";
pub const SPEC_FILE: &str = "openapi.yml";
pub const PROJECT_CONFIG_FILE: &str = "fern.config.json";
pub const GENERATORS_FILE: &str = "generators.yml";
pub const OUTPUT_DIR: &str = "sdks";

/// Absolute paths of one materialized project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub project_dir: PathBuf,
    pub spec_dir: PathBuf,
    pub spec_file: PathBuf,
    pub project_config_file: PathBuf,
    pub generators_file: PathBuf,
    pub output_dir: PathBuf,
    /// Declared output subdirectory (generate jobs only)
    pub output_subdir: Option<PathBuf>,
}

impl ProjectLayout {
    pub fn for_workspace(root: &Path) -> Self {
        let project_dir = root.join(PROJECT_DIR);
        let spec_dir = project_dir.join(SPEC_DIR);
        Self {
            root: root.to_path_buf(),
            spec_file: spec_dir.join(SPEC_FILE),
            project_config_file: project_dir.join(PROJECT_CONFIG_FILE),
            generators_file: project_dir.join(GENERATORS_FILE),
            output_dir: root.join(OUTPUT_DIR),
            output_subdir: None,
            project_dir,
            spec_dir,
        }
    }

    /// Declare the output subpath (relative to the workspace root)
    pub fn with_output_subpath(mut self, subpath: &Path) -> Self {
        self.output_subdir = Some(self.root.join(subpath));
        self
    }

    /// Spec location as referenced from `generators.yml`
    pub fn spec_reference() -> String {
        format!("{}/{}", SPEC_DIR, SPEC_FILE)
    }

    /// Output location as referenced from `generators.yml`
    /// (paths there are relative to the project dir)
    pub fn output_reference(subpath: &Path) -> String {
        let rel = subpath
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("../{}", rel)
    }

    /// Every file and directory the tool contract requires
    pub fn required_entries(&self) -> Vec<&Path> {
        vec![
            &self.project_dir,
            &self.spec_dir,
            &self.spec_file,
            &self.project_config_file,
            &self.generators_file,
            &self.output_dir,
        ]
    }

    /// Required entries that are absent on disk
    pub fn missing_entries(&self) -> Vec<PathBuf> {
        self.required_entries()
            .into_iter()
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect()
    }
}
