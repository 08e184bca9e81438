// Filesystem project materializer
//
// Writes the project skeleton the external generator expects. The layout is
// a contract with the tool: a wrong path there fails silently inside the
// tool, so every required entry is created here and verified by the caller.
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use forge_core::domain::{GeneratorConfig, JobKind, ProjectLayout};
use forge_core::error::{JobError, Result};
use forge_core::port::{MaterializeRequest, ProjectMaterializer, Workspace};

/// Default organization written to the project identity file
pub const DEFAULT_ORGANIZATION: &str = "sdk-forge";

/// Output location kind understood by the generator
const LOCAL_OUTPUT: &str = "local-file-system";

/// Project identity (not configurable per request)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectIdentity {
    pub organization: String,
    pub version: String,
}

impl ProjectIdentity {
    pub fn new(organization: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            version: version.into(),
        }
    }
}

// generators.yml schema

#[derive(Debug, Serialize)]
struct GeneratorsFile {
    api: ApiSection,
    #[serde(rename = "default-group", skip_serializing_if = "Option::is_none")]
    default_group: Option<String>,
    groups: BTreeMap<String, GroupSection>,
}

#[derive(Debug, Serialize)]
struct ApiSection {
    specs: Vec<SpecEntry>,
}

#[derive(Debug, Serialize)]
struct SpecEntry {
    openapi: String,
}

#[derive(Debug, Serialize)]
struct GroupSection {
    generators: Vec<GeneratorEntry>,
}

#[derive(Debug, Serialize)]
struct GeneratorEntry {
    name: String,
    version: String,
    output: OutputSection,
    config: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Serialize)]
struct OutputSection {
    location: &'static str,
    path: String,
}

impl GeneratorsFile {
    /// Minimal stub: enough for `check`, no generator selected
    fn validate_stub() -> Self {
        Self {
            api: ApiSection::default_spec(),
            default_group: None,
            groups: BTreeMap::new(),
        }
    }

    /// Exactly one group holding the selected variant
    fn for_generator(generator: &GeneratorConfig) -> Self {
        let mut config: BTreeMap<String, serde_yaml::Value> = generator
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), passthrough_value(value)))
            .collect();
        // typed keys win over anything passed through
        config.insert(
            "packageName".to_string(),
            serde_yaml::Value::String(generator.package_name.to_string()),
        );
        config.insert(
            "includeExamples".to_string(),
            serde_yaml::Value::Bool(generator.include_examples),
        );
        config.insert(
            "includeTests".to_string(),
            serde_yaml::Value::Bool(generator.include_tests),
        );

        let group = generator.group().to_string();
        let entry = GeneratorEntry {
            name: generator.variant.generator.to_string(),
            version: generator.variant.version.to_string(),
            output: OutputSection {
                location: LOCAL_OUTPUT,
                path: ProjectLayout::output_reference(&generator.output_subpath()),
            },
            config,
        };

        let mut groups = BTreeMap::new();
        groups.insert(
            group.clone(),
            GroupSection {
                generators: vec![entry],
            },
        );

        Self {
            api: ApiSection::default_spec(),
            default_group: Some(group),
            groups,
        }
    }
}

impl ApiSection {
    fn default_spec() -> Self {
        Self {
            specs: vec![SpecEntry {
                openapi: ProjectLayout::spec_reference(),
            }],
        }
    }
}

/// Literal booleans stay booleans; everything else is forwarded as text
fn passthrough_value(raw: &str) -> serde_yaml::Value {
    match raw {
        "true" => serde_yaml::Value::Bool(true),
        "false" => serde_yaml::Value::Bool(false),
        other => serde_yaml::Value::String(other.to_string()),
    }
}

/// Materializer writing to the local filesystem
pub struct FsProjectMaterializer {
    identity: ProjectIdentity,
}

impl FsProjectMaterializer {
    pub fn new(identity: ProjectIdentity) -> Self {
        Self { identity }
    }

    async fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| JobError::resource(format!("write {}", path.display()), e))
    }

    async fn mkdir(path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| JobError::resource(format!("create {}", path.display()), e))
    }

    fn render_generators(request: &MaterializeRequest<'_>) -> Result<String> {
        let file = match (request.kind, request.generator) {
            (JobKind::Validate, _) => GeneratorsFile::validate_stub(),
            (JobKind::Generate, Some(generator)) => GeneratorsFile::for_generator(generator),
            (JobKind::Generate, None) => {
                return Err(JobError::Internal(
                    "generate job materialized without a generator".to_string(),
                ))
            }
        };
        serde_yaml::to_string(&file)
            .map_err(|e| JobError::Internal(format!("render generators.yml: {}", e)))
    }
}

#[async_trait]
impl ProjectMaterializer for FsProjectMaterializer {
    async fn materialize(
        &self,
        workspace: &Workspace,
        request: MaterializeRequest<'_>,
    ) -> Result<ProjectLayout> {
        // Checked before anything is written
        let spec = match request.input_spec {
            Some(spec) if !spec.is_empty() => spec,
            _ => {
                return Err(JobError::Validation(
                    "an input specification file is required".to_string(),
                ))
            }
        };
        let generators = Self::render_generators(&request)?;
        let identity = serde_json::to_string_pretty(&self.identity)
            .map_err(|e| JobError::Internal(format!("render project identity: {}", e)))?;

        let mut layout = ProjectLayout::for_workspace(workspace.path());
        if let Some(generator) = request.generator {
            layout = layout.with_output_subpath(&generator.output_subpath());
        }

        Self::mkdir(&layout.spec_dir).await?;
        Self::mkdir(&layout.output_dir).await?;
        Self::write(&layout.spec_file, &spec.contents).await?;
        Self::write(&layout.project_config_file, identity).await?;
        Self::write(&layout.generators_file, generators).await?;

        debug!(
            workspace = %workspace.root.display(),
            kind = %request.kind,
            "Project materialized"
        );
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::domain::{InputSpec, JobOptions, PackageName, TargetLanguage};

    fn materializer() -> FsProjectMaterializer {
        FsProjectMaterializer::new(ProjectIdentity::new("acme", "0.45.0"))
    }

    fn workspace(dir: &tempfile::TempDir) -> Workspace {
        Workspace::new(dir.path().to_path_buf(), 0)
    }

    fn generator(language: &str, options: JobOptions) -> GeneratorConfig {
        GeneratorConfig::resolve(
            language,
            PackageName::parse("acme-client").unwrap(),
            &options,
        )
        .unwrap()
    }

    fn read_yaml(path: &Path) -> serde_yaml::Value {
        serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_generate_layout_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let spec = InputSpec::new(None, "openapi: 3.0.0\ninfo: {title: t, version: '1'}");
        let generator = generator("python", JobOptions::new());

        let layout = materializer()
            .materialize(
                &workspace(&dir),
                MaterializeRequest {
                    input_spec: Some(&spec),
                    kind: JobKind::Generate,
                    generator: Some(&generator),
                },
            )
            .await
            .unwrap();

        assert!(layout.missing_entries().is_empty());
        assert_eq!(
            std::fs::read(&layout.spec_file).unwrap(),
            spec.contents
        );
        assert_eq!(layout.output_subdir, Some(dir.path().join("sdks/python")));

        let identity: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&layout.project_config_file).unwrap())
                .unwrap();
        assert_eq!(identity["organization"], "acme");
        assert_eq!(identity["version"], "0.45.0");
    }

    #[tokio::test]
    async fn test_each_language_writes_its_variant() {
        for language in TargetLanguage::ALL {
            let dir = tempfile::tempdir().unwrap();
            let spec = InputSpec::new(None, "openapi: 3.0.0");
            let generator = generator(language.as_str(), JobOptions::new());

            let layout = materializer()
                .materialize(
                    &workspace(&dir),
                    MaterializeRequest {
                        input_spec: Some(&spec),
                        kind: JobKind::Generate,
                        generator: Some(&generator),
                    },
                )
                .await
                .unwrap();

            let yaml = read_yaml(&layout.generators_file);
            let entry = &yaml["groups"][language.as_str()]["generators"][0];
            assert_eq!(yaml["default-group"].as_str(), Some(language.as_str()));
            assert_eq!(entry["name"].as_str(), Some(language.variant().generator));
            assert_eq!(entry["version"].as_str(), Some(language.variant().version));
            assert_eq!(
                entry["output"]["path"].as_str(),
                Some(format!("../sdks/{}", language.as_str()).as_str())
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_language_writes_typescript_variant() {
        let dir = tempfile::tempdir().unwrap();
        let spec = InputSpec::new(None, "openapi: 3.0.0");
        let generator = generator("cobol", JobOptions::new());

        let layout = materializer()
            .materialize(
                &workspace(&dir),
                MaterializeRequest {
                    input_spec: Some(&spec),
                    kind: JobKind::Generate,
                    generator: Some(&generator),
                },
            )
            .await
            .unwrap();

        let yaml = read_yaml(&layout.generators_file);
        assert_eq!(
            yaml["groups"]["typescript"]["generators"][0]["name"].as_str(),
            Some("fernapi/fern-typescript-node-sdk")
        );
    }

    #[tokio::test]
    async fn test_toggles_and_passthrough_options() {
        let dir = tempfile::tempdir().unwrap();
        let spec = InputSpec::new(None, "openapi: 3.0.0");
        let options = JobOptions::new()
            .with("includeExamples", "false")
            .with("noSerdeLayer", "true")
            .with("clientName", "AcmeClient");
        let generator = generator("java", options);

        let layout = materializer()
            .materialize(
                &workspace(&dir),
                MaterializeRequest {
                    input_spec: Some(&spec),
                    kind: JobKind::Generate,
                    generator: Some(&generator),
                },
            )
            .await
            .unwrap();

        let yaml = read_yaml(&layout.generators_file);
        let config = &yaml["groups"]["java"]["generators"][0]["config"];
        assert_eq!(config["includeExamples"].as_bool(), Some(false));
        assert_eq!(config["includeTests"].as_bool(), Some(false));
        assert_eq!(config["noSerdeLayer"].as_bool(), Some(true));
        assert_eq!(config["clientName"].as_str(), Some("AcmeClient"));
        assert_eq!(config["packageName"].as_str(), Some("acme-client"));
    }

    #[tokio::test]
    async fn test_package_name_option_cannot_override_validated_name() {
        let dir = tempfile::tempdir().unwrap();
        let spec = InputSpec::new(None, "openapi: 3.0.0");
        let mut generator = generator(
            "python",
            JobOptions::new().with("packageName", "../../evil name"),
        );
        assert!(!generator.extra.contains_key("packageName"));
        generator
            .extra
            .insert("packageName".to_string(), "../../evil name".to_string());

        let layout = materializer()
            .materialize(
                &workspace(&dir),
                MaterializeRequest {
                    input_spec: Some(&spec),
                    kind: JobKind::Generate,
                    generator: Some(&generator),
                },
            )
            .await
            .unwrap();

        let yaml = read_yaml(&layout.generators_file);
        let config = &yaml["groups"]["python"]["generators"][0]["config"];
        assert_eq!(config["packageName"].as_str(), Some("acme-client"));
        assert_eq!(
            generator.archive_file_name("tar.gz"),
            "acme-client-python-sdk.tar.gz"
        );
    }

    #[tokio::test]
    async fn test_validate_writes_stub_without_generators() {
        let dir = tempfile::tempdir().unwrap();
        let spec = InputSpec::new(None, "openapi: 3.0.0");

        let layout = materializer()
            .materialize(
                &workspace(&dir),
                MaterializeRequest {
                    input_spec: Some(&spec),
                    kind: JobKind::Validate,
                    generator: None,
                },
            )
            .await
            .unwrap();

        assert!(layout.missing_entries().is_empty());
        let yaml = read_yaml(&layout.generators_file);
        assert_eq!(yaml["api"]["specs"][0]["openapi"].as_str(), Some("openapi/openapi.yml"));
        assert!(yaml["groups"].as_mapping().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_spec_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();

        let err = materializer()
            .materialize(
                &workspace(&dir),
                MaterializeRequest {
                    input_spec: None,
                    kind: JobKind::Validate,
                    generator: None,
                },
            )
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
