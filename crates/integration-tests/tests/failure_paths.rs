//! Failure paths: every job error surfaces only after the workspace is gone

use std::time::Duration;

use forge_core::domain::{InputSpec, JobRequest};
use forge_core::error::JobError;
use forge_infra_system::ToolSettings;
use forge_integration_tests::{
    fake_tool_settings, marked_spec, sh, spec, Harness, PETSTORE,
};

#[tokio::test]
async fn test_generate_failure_carries_tool_stderr() {
    let h = Harness::new();

    let err = h
        .orchestrator
        .generate(JobRequest::generate(marked_spec("FAIL_GENERATE"), "go", "acme"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "tool_invocation_error");
    let output = err.tool_output().expect("captured output");
    assert_eq!(output.exit_code, Some(1));
    assert!(output.stderr.contains("unsupported schema type"));
    assert!(output.stdout.contains("Generating go"));
    assert!(err
        .diagnostics()
        .iter()
        .any(|d| d == "generation failed: unsupported schema type"));
    assert!(h.residue().is_empty(), "leftover: {:?}", h.residue());
}

#[tokio::test]
async fn test_missing_output_is_a_packaging_error() {
    let h = Harness::new();

    let err = h
        .orchestrator
        .generate(JobRequest::generate(marked_spec("NO_OUTPUT"), "ruby", "acme"))
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Packaging(_)), "got {:?}", err);
    assert_eq!(err.kind(), "packaging_error");
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_missing_runtime_is_tool_unavailable() {
    let h = Harness::with_settings(ToolSettings {
        runtime_check: sh("echo 'node: not found' >&2; exit 127"),
        ..fake_tool_settings()
    });

    let err = h
        .orchestrator
        .generate(JobRequest::generate(spec(PETSTORE), "python", "acme"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "tool_unavailable_error");
    assert!(!err.is_client_error());
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_unrunnable_runtime_is_tool_unavailable() {
    let h = Harness::with_settings(ToolSettings {
        runtime_check: vec!["/nonexistent/forge-runtime".to_string()],
        ..fake_tool_settings()
    });

    let err = h
        .orchestrator
        .validate(JobRequest::validate(spec(PETSTORE)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "tool_unavailable_error");
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_failed_install_is_tool_install_error() {
    let h = Harness::with_settings(ToolSettings {
        install: sh("echo 'npm ERR! 404 fern-api@{version}' >&2; exit 1"),
        ..fake_tool_settings()
    });

    let err = h
        .orchestrator
        .generate(JobRequest::generate(spec(PETSTORE), "csharp", "acme"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "tool_install_error");
    let output = err.tool_output().expect("captured output");
    assert!(output.stderr.contains("npm ERR! 404"));
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_missing_spec_is_rejected_before_allocation() {
    let h = Harness::new();
    let request = JobRequest {
        input_spec: None,
        ..JobRequest::generate(spec(PETSTORE), "python", "acme")
    };

    let err = h.orchestrator.generate(request).await.unwrap_err();

    assert_eq!(err.kind(), "validation_error");
    assert!(err.is_client_error());
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_empty_spec_is_rejected() {
    let h = Harness::new();

    let err = h
        .orchestrator
        .validate(JobRequest::validate(InputSpec::new(None, Vec::new())))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "validation_error");
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_invalid_package_name_is_rejected() {
    let h = Harness::new();

    let err = h
        .orchestrator
        .generate(JobRequest::generate(spec(PETSTORE), "python", "bad name!"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "validation_error");
    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_timed_out_generate_is_an_invocation_error() {
    let h = Harness::with_settings(ToolSettings {
        timeout: Some(Duration::from_millis(200)),
        ..fake_tool_settings()
    });

    let err = h
        .orchestrator
        .generate(JobRequest::generate(marked_spec("SLOW_GENERATE"), "python", "acme"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "tool_invocation_error");
    assert!(h.residue().is_empty());
}
