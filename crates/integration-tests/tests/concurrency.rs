//! Concurrent jobs never share a workspace and leave nothing behind

use std::collections::HashSet;
use std::time::Duration;

use forge_core::domain::{JobRequest, TargetLanguage};
use forge_integration_tests::{marked_spec, spec, unpack, Harness, PETSTORE};

const JOBS: usize = 10;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_generates_are_isolated() {
    let h = Harness::new();

    let mut handles = Vec::with_capacity(JOBS);
    for i in 0..JOBS {
        let orchestrator = h.orchestrator.clone();
        let language = TargetLanguage::ALL[i % TargetLanguage::ALL.len()];
        handles.push(tokio::spawn(async move {
            let package = format!("pkg{}", i);
            let sdk = orchestrator
                .generate(JobRequest::generate(spec(PETSTORE), language.as_str(), &package))
                .await
                .unwrap();
            (package, language, sdk)
        }));
    }

    let mut job_ids = HashSet::new();
    for handle in handles {
        let (package, language, sdk) = handle.await.unwrap();
        assert!(job_ids.insert(sdk.job_id.clone()), "duplicate job id {}", sdk.job_id);
        assert_eq!(sdk.file_name, format!("{}-{}-sdk.tar.gz", package, language));

        // each archive holds exactly its own job's output
        let snapshot = unpack(&sdk.bytes)
            .into_iter()
            .find(|(p, _)| p.ends_with("generators.snapshot.yml"))
            .map(|(_, c)| c)
            .unwrap();
        assert!(snapshot.contains(&format!("packageName: {}", package)));
    }

    assert_eq!(job_ids.len(), JOBS);

    let allocated = h.allocated();
    assert_eq!(allocated.len(), JOBS);
    let distinct: HashSet<_> = allocated.iter().collect();
    assert_eq!(distinct.len(), JOBS, "shared workspace in {:?}", allocated);

    assert!(h.residue().is_empty(), "leftover: {:?}", h.residue());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failures_do_not_disturb_neighbours() {
    let h = Harness::new();

    let mut handles = Vec::new();
    for i in 0..JOBS {
        let orchestrator = h.orchestrator.clone();
        handles.push(tokio::spawn(async move {
            let input = if i % 2 == 0 {
                spec(PETSTORE)
            } else {
                marked_spec("FAIL_GENERATE")
            };
            (
                i,
                orchestrator
                    .generate(JobRequest::generate(input, "python", "acme"))
                    .await,
            )
        }));
    }

    for handle in handles {
        let (i, result) = handle.await.unwrap();
        if i % 2 == 0 {
            assert!(result.is_ok(), "job {} failed: {:?}", i, result.err());
        } else {
            assert_eq!(result.unwrap_err().kind(), "tool_invocation_error");
        }
    }

    assert!(h.residue().is_empty(), "leftover: {:?}", h.residue());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_validate_and_generate() {
    let h = Harness::new();

    let validate = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .validate(JobRequest::validate(marked_spec("MALFORMED")))
                .await
        })
    };
    let generate = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .generate(JobRequest::generate(marked_spec("SLOW_GENERATE"), "go", "acme"))
                .await
        })
    };

    let report = validate.await.unwrap().unwrap();
    assert!(!report.valid);
    let sdk = generate.await.unwrap().unwrap();
    assert_eq!(sdk.language, TargetLanguage::Go);

    assert!(h.residue().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_request_still_runs_to_cleanup() {
    let h = Harness::new();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(300),
        h.orchestrator
            .generate(JobRequest::generate(marked_spec("SLOW_GENERATE"), "python", "acme")),
    )
    .await;
    assert!(abandoned.is_err(), "job finished before the caller gave up");

    // the generator is still running in the workspace
    assert_eq!(h.residue().len(), 1);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !h.residue().is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "workspace never released: {:?}",
            h.residue()
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(h.allocated().len(), 1);
}
