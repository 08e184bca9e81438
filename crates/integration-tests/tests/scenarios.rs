//! End-to-end scenarios: generate, validate, language fallback

use forge_core::domain::{JobOptions, JobRequest, TargetLanguage};
use forge_integration_tests::{generators_snapshot, marked_spec, spec, unpack, Harness, PETSTORE};

/// Scenario A: generate a python SDK from a well-formed spec
#[tokio::test]
async fn test_generate_python_delivers_archive_and_cleans_up() {
    let h = Harness::new();

    let sdk = h
        .orchestrator
        .generate(JobRequest::generate(spec(PETSTORE), "python", "acme"))
        .await
        .unwrap();

    assert_eq!(sdk.file_name, "acme-python-sdk.tar.gz");
    assert_eq!(sdk.content_type, "application/gzip");
    assert_eq!(sdk.language, TargetLanguage::Python);
    assert!(!sdk.fell_back);

    let files = unpack(&sdk.bytes);
    let names: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
    assert!(names.contains(&"python/src/client.txt"), "entries: {:?}", names);
    assert!(names.iter().all(|n| n.starts_with("python/")));

    let snapshot = generators_snapshot(&sdk.bytes, "python");
    let entry = &snapshot["groups"]["python"]["generators"][0];
    assert_eq!(entry["name"].as_str(), Some("fernapi/fern-python-sdk"));
    assert_eq!(entry["config"]["packageName"].as_str(), Some("acme"));

    assert!(h.residue().is_empty(), "leftover: {:?}", h.residue());
}

#[tokio::test]
async fn test_generate_typescript_for_acme_client() {
    let h = Harness::new();

    let sdk = h
        .orchestrator
        .generate(JobRequest::generate(spec(PETSTORE), "typescript", "acme-client"))
        .await
        .unwrap();

    assert_eq!(sdk.file_name, "acme-client-typescript-sdk.tar.gz");
    assert_eq!(sdk.language, TargetLanguage::TypeScript);
    assert!(!sdk.fell_back);

    let files = unpack(&sdk.bytes);
    assert!(files.iter().any(|(p, _)| p == "typescript/src/client.txt"));
    let snapshot = generators_snapshot(&sdk.bytes, "typescript");
    let entry = &snapshot["groups"]["typescript"]["generators"][0];
    assert_eq!(entry["name"].as_str(), Some("fernapi/fern-typescript-node-sdk"));
    assert_eq!(entry["config"]["packageName"].as_str(), Some("acme-client"));
    assert_eq!(entry["config"]["includeExamples"].as_bool(), Some(true));
    assert_eq!(entry["config"]["includeTests"].as_bool(), Some(false));

    assert!(h.residue().is_empty());
}

/// Scenario B: validating a malformed spec is a normal response
#[tokio::test]
async fn test_validate_malformed_spec_reports_diagnostics() {
    let h = Harness::new();

    let report = h
        .orchestrator
        .validate(JobRequest::validate(marked_spec("MALFORMED")))
        .await
        .unwrap();

    assert!(!report.valid);
    assert_eq!(
        report.diagnostics,
        vec![
            "error: fern/openapi/openapi.yml is not a valid OpenAPI document".to_string(),
            "at paths./pets.get: missing responses".to_string(),
        ]
    );
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_validate_well_formed_spec() {
    let h = Harness::new();

    let report = h
        .orchestrator
        .validate(JobRequest::validate(spec(PETSTORE)))
        .await
        .unwrap();

    assert!(report.valid);
    assert!(report.diagnostics.is_empty());
    assert!(h.residue().is_empty());
}

/// Scenario C: an unsupported language falls back to typescript
#[tokio::test]
async fn test_unsupported_language_falls_back_to_typescript() {
    let h = Harness::new();

    let sdk = h
        .orchestrator
        .generate(JobRequest::generate(spec(PETSTORE), "cobol", "acme"))
        .await
        .unwrap();

    assert!(sdk.fell_back);
    assert_eq!(sdk.language, TargetLanguage::TypeScript);
    assert_eq!(sdk.file_name, "acme-typescript-sdk.tar.gz");

    let snapshot = generators_snapshot(&sdk.bytes, "typescript");
    assert_eq!(
        snapshot["groups"]["typescript"]["generators"][0]["name"].as_str(),
        Some("fernapi/fern-typescript-node-sdk")
    );
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_every_language_generates_into_its_own_subpath() {
    let h = Harness::new();

    for language in TargetLanguage::ALL {
        let sdk = h
            .orchestrator
            .generate(JobRequest::generate(spec(PETSTORE), language.as_str(), "acme"))
            .await
            .unwrap();

        let prefix = format!("{}/", language.as_str());
        assert!(unpack(&sdk.bytes).iter().all(|(p, _)| p.starts_with(&prefix)));
        assert_eq!(
            generators_snapshot(&sdk.bytes, language.as_str())["default-group"].as_str(),
            Some(language.as_str())
        );
    }

    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_options_reach_the_generator_config() {
    let h = Harness::new();
    let options = JobOptions::new()
        .with("includeExamples", "no")
        .with("include_tests", "yes")
        .with("clientClassName", "PetstoreClient")
        .with("packageName", "../../evil name");

    let sdk = h
        .orchestrator
        .generate(JobRequest::generate(spec(PETSTORE), "java", "acme").with_options(options))
        .await
        .unwrap();

    let snapshot = generators_snapshot(&sdk.bytes, "java");
    let config = &snapshot["groups"]["java"]["generators"][0]["config"];
    assert_eq!(config["includeExamples"].as_bool(), Some(false));
    assert_eq!(config["includeTests"].as_bool(), Some(true));
    assert_eq!(config["clientClassName"].as_str(), Some("PetstoreClient"));
    assert_eq!(config["packageName"].as_str(), Some("acme"));
    assert_eq!(sdk.file_name, "acme-java-sdk.tar.gz");
}
