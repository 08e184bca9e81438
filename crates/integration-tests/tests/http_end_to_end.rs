//! HTTP surface over real adapters

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use forge_api_http::{ApiServer, AppState};
use forge_integration_tests::{unpack, Harness, PETSTORE};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "e2e-boundary";
const API_KEY: &str = "e2e-secret";

fn router(h: &Harness) -> axum::Router {
    let state = AppState {
        orchestrator: h.orchestrator.clone(),
        workspace_root: h.root.path().to_path_buf(),
        tool_program: "fern".to_string(),
        api_key: Some(Arc::from(API_KEY)),
    };
    ApiServer::router(state, 1024 * 1024)
}

fn form(spec: &str, fields: &[(&str, &str)]) -> Body {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"spec\"; filename=\"openapi.yml\"\r\n\
         Content-Type: application/yaml\r\n\r\n{spec}\r\n",
        b = BOUNDARY,
        spec = spec
    );
    for (name, value) in fields {
        body.push_str(&format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            BOUNDARY, name, value
        ));
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));
    Body::from(body)
}

fn post(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("authorization", format!("Bearer {}", API_KEY))
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn test_generate_over_http() {
    let h = Harness::new();

    let response = router(&h)
        .oneshot(post(
            "/generate?includeTests=true",
            form(PETSTORE, &[("targetLanguage", "Python"), ("package_name", "acme")]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/gzip");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"acme-python-sdk.tar.gz\""
    );
    assert_eq!(headers["x-forge-language"], "python");
    assert_eq!(headers["x-forge-language-fallback"], "false");
    assert!(headers.contains_key("x-forge-job-id"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let files = unpack(&bytes);
    let snapshot = files
        .iter()
        .find(|(p, _)| p == "python/generators.snapshot.yml")
        .map(|(_, c)| c.as_str())
        .unwrap();
    assert!(snapshot.contains("includeTests: true"));

    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_validate_over_http_reports_malformed_spec() {
    let h = Harness::new();
    let malformed = format!("{}# MALFORMED\n", PETSTORE);

    let response = router(&h)
        .oneshot(post("/validate", form(&malformed, &[])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["valid"], false);
    assert_eq!(
        body["diagnostics"][1],
        "at paths./pets.get: missing responses"
    );
    assert!(body["jobId"].is_string());

    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_generate_failure_over_http_is_500_with_stderr() {
    let h = Harness::new();
    let failing = format!("{}# FAIL_GENERATE\n", PETSTORE);

    let response = router(&h)
        .oneshot(post(
            "/generate",
            form(&failing, &[("language", "go"), ("packageName", "acme")]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["kind"], "tool_invocation_error");
    assert!(body["stderr"]
        .as_str()
        .unwrap()
        .contains("unsupported schema type"));

    assert!(h.residue().is_empty());
}

#[tokio::test]
async fn test_wrong_key_never_allocates() {
    let h = Harness::new();

    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-api-key", "wrong")
        .body(form(PETSTORE, &[("language", "go"), ("packageName", "acme")]))
        .unwrap();

    let response = router(&h).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(h.residue().is_empty());
}
