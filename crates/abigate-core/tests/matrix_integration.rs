//! Integration tests for the full compatibility matrix over the
//! scripted invoker: invocation sequencing, environment wiring, and
//! the fatal-vs-recorded failure policy.

use std::path::Path;

use sha2::Digest;

use abigate_core::fakes::{Response, ScriptedInvoker};
use abigate_core::{
    Architecture, CompatibilityRunner, Direction, HarnessConfig, HarnessError, ReleaseId,
    ReleaseTag, VersionCatalog,
};

const TAG_LIST: &str = "v1.7.5\nv1.8.0\nv1.9.4\n";

/// Config rooted in a temp dir, single architecture, with the scratch
/// area and every expected artifact directory seeded so the non-empty
/// artifact check can pass without a real build.
fn scripted_setup(tmp: &Path, tags: &[&str]) -> (HarnessConfig, ScriptedInvoker) {
    let mut config = HarnessConfig::for_source_root(tmp);
    config.architectures = vec![Architecture::X86_64];

    std::fs::create_dir_all(config.head_lib_dir()).unwrap();
    std::fs::write(config.head_lib_dir().join("liblz4.so.1"), b"elf").unwrap();
    std::fs::create_dir_all(config.test_dir()).unwrap();
    std::fs::write(config.test_dir().join("README.md"), b"reference payload").unwrap();
    for tag in tags {
        let lib = config.scratch_dir.join(tag).join("lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("liblz4.so.1"), b"elf").unwrap();
    }

    let invoker = ScriptedInvoker::new();
    invoker.on("git", "tag -l", Response::Exit(0, TAG_LIST.to_string()));
    (config, invoker)
}

async fn discover(invoker: &ScriptedInvoker, config: &HarnessConfig) -> Vec<ReleaseId> {
    VersionCatalog::discover(invoker, &config.clone_dir(), config.floor)
        .await
        .expect("discover failed")
}

#[tokio::test]
async fn full_matrix_passes_and_sequences_correctly() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, invoker) = scripted_setup(tmp.path(), &["v1.7.5", "v1.8.0", "v1.9.4"]);

    let catalog = discover(&invoker, &config).await;
    assert_eq!(catalog.len(), 4, "HEAD + three tags");

    let runner = CompatibilityRunner::new(&invoker, &config);
    let outcome = runner.run(&catalog).await.expect("run failed");

    assert!(outcome.passed);
    assert_eq!(outcome.cases.len(), 8, "4 releases x 2 directions");
    assert_eq!(outcome.passed_count(), 8);
    assert!(outcome.first_failure.is_none());
    assert_eq!(
        outcome.payload_digests[0].sha256.as_deref(),
        Some(
            // sha256 of "reference payload"
            hex::encode(sha2::Sha256::digest(b"reference payload" as &[u8])).as_str()
        )
    );

    // Build phase: clean + build per release, all before any probe.
    let makes = invoker.calls_of("make");
    let lib_builds: Vec<_> = makes
        .iter()
        .filter(|m| m.args.contains(&config.library_target))
        .collect();
    assert_eq!(lib_builds.len(), 4);
    let consumer_builds: Vec<_> = makes
        .iter()
        .filter(|m| m.args.contains(&config.consumer_target))
        .collect();
    assert_eq!(
        consumer_builds.len(),
        4,
        "one forward consumer + one per tag backward"
    );

    // Per-release build isolation: each tagged build ran in its own
    // scratch directory.
    for tag in ["v1.7.5", "v1.8.0", "v1.9.4"] {
        let expected = config.scratch_dir.join(tag).join("lib");
        assert!(
            lib_builds.iter().any(|m| m.cwd == expected),
            "no isolated build for {tag}"
        );
    }

    // Probe then round trip, per release per direction.
    let probes = invoker.calls_of(&config.probe_command);
    assert_eq!(probes.len(), 8);
    let round_trips = invoker.calls_of("./abiTest");
    assert_eq!(round_trips.len(), 8);
    for rt in &round_trips {
        assert_eq!(rt.args, vec!["README.md"]);
    }
}

#[tokio::test]
async fn forward_cases_point_runtime_path_at_each_release() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, invoker) = scripted_setup(tmp.path(), &["v1.7.5", "v1.8.0", "v1.9.4"]);

    let catalog = discover(&invoker, &config).await;
    let runner = CompatibilityRunner::new(&invoker, &config);
    runner.run(&catalog).await.expect("run failed");

    let probes = invoker.calls_of(&config.probe_command);
    let v180_lib = config.scratch_dir.join("v1.8.0").join("lib");
    let v180_path = v180_lib.display().to_string();
    assert!(
        probes
            .iter()
            .any(|p| p.env_var("LD_LIBRARY_PATH") == Some(v180_path.as_str())),
        "forward probe for v1.8.0 must resolve through its own artifact"
    );

    // Backward consumers compile against each tag's headers.
    let makes = invoker.calls_of("make");
    let v180_cppflags = format!("-I{}", v180_lib.display());
    assert!(
        makes
            .iter()
            .any(|m| m.env_var("CPPFLAGS") == Some(v180_cppflags.as_str())),
        "backward consumer for v1.8.0 must compile against its headers"
    );

    // Backward runs resolve through the HEAD library.
    let head_lib = config.head_lib_dir().display().to_string();
    let head_runs = invoker
        .calls_of("./abiTest")
        .into_iter()
        .filter(|c| c.env_var("LD_LIBRARY_PATH") == Some(head_lib.as_str()))
        .count();
    // 4 backward cases + the trivial forward HEAD case.
    assert_eq!(head_runs, 5);
}

#[tokio::test]
async fn checks_resolve_through_the_built_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, invoker) = scripted_setup(tmp.path(), &["v1.7.5", "v1.8.0", "v1.9.4"]);

    let catalog = discover(&invoker, &config).await;
    let runner = CompatibilityRunner::new(&invoker, &config);
    runner.run(&catalog).await.expect("run failed");

    // Every runtime search path handed to a probe or round trip must
    // be a directory the build phase actually built in — no check may
    // point at a location no artifact was produced for.
    let built_dirs: Vec<String> = invoker
        .calls_of("make")
        .iter()
        .filter(|m| m.args.contains(&config.library_target))
        .map(|m| m.cwd.display().to_string())
        .collect();
    assert_eq!(built_dirs.len(), 4);

    for call in invoker.calls() {
        if let Some(path) = call.env_var("LD_LIBRARY_PATH") {
            assert!(
                built_dirs.iter().any(|d| d == path),
                "{} resolved through unbuilt dir {path}",
                call.program
            );
        }
    }
}

#[tokio::test]
async fn build_failure_aborts_before_later_releases() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, invoker) = scripted_setup(tmp.path(), &["v1.7.5", "v1.8.0", "v1.9.4"]);
    invoker.on_in("make", "liblz4", "v1.8.0", Response::Exit(2, String::new()));

    let catalog = discover(&invoker, &config).await;
    let runner = CompatibilityRunner::new(&invoker, &config);
    let err = runner.run(&catalog).await.unwrap_err();

    match err {
        HarnessError::Build { release, .. } => {
            assert_eq!(release, ReleaseId::Tagged(ReleaseTag::new(1, 8, 0)));
        }
        other => panic!("expected Build error, got {other}"),
    }

    // Fail-fast: v1.9.4 must never have been touched. A materialize
    // would carry the tag in its args with cwd still at the clone, so
    // both are scanned.
    assert!(
        !invoker.calls().iter().any(|c| {
            c.cwd.to_string_lossy().contains("v1.9.4")
                || c.args.iter().any(|a| a.contains("v1.9.4"))
        }),
        "no step may run for releases after the failed build"
    );
    assert!(
        invoker.calls_of(&config.probe_command).is_empty(),
        "no compatibility check may run after a fatal build failure"
    );
}

#[tokio::test]
async fn probe_mismatch_is_recorded_and_later_cases_still_run() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, invoker) = scripted_setup(tmp.path(), &["v1.7.5", "v1.8.0", "v1.9.4"]);
    invoker.on(&config.probe_command, "", Response::Exit(1, String::new()));

    let catalog = discover(&invoker, &config).await;
    let runner = CompatibilityRunner::new(&invoker, &config);
    let outcome = runner.run(&catalog).await.expect("run must not abort");

    assert!(!outcome.passed);
    assert_eq!(outcome.cases.len(), 8, "every case still ran");
    assert_eq!(outcome.failed_count(), 8);

    let first = outcome.first_failure.expect("first failure recorded");
    assert_eq!(first.release, ReleaseId::Head);
    assert_eq!(first.arch, Architecture::X86_64);
    assert_eq!(first.direction, Direction::ForwardLink);

    // A wrong resolved library makes the round trip meaningless.
    assert!(invoker.calls_of("./abiTest").is_empty());
}

#[tokio::test]
async fn round_trip_failure_is_recorded_per_case() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, invoker) = scripted_setup(tmp.path(), &["v1.7.5", "v1.8.0", "v1.9.4"]);
    invoker.on("./abiTest", "README.md", Response::Exit(1, String::new()));

    let catalog = discover(&invoker, &config).await;
    let runner = CompatibilityRunner::new(&invoker, &config);
    let outcome = runner.run(&catalog).await.expect("run must not abort");

    assert!(!outcome.passed);
    assert_eq!(outcome.failed_count(), 8);
    for case in &outcome.cases {
        assert!(case.probe_matched);
        assert!(!case.round_trip_ok);
        assert!(case.detail.contains("round trip failed"));
    }
    assert_eq!(invoker.calls_of("./abiTest").len(), 8);
}

#[tokio::test]
async fn consumer_spawn_failure_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, invoker) = scripted_setup(tmp.path(), &["v1.7.5", "v1.8.0", "v1.9.4"]);
    invoker.on("./abiTest", "", Response::SpawnFailure);

    let catalog = discover(&invoker, &config).await;
    let runner = CompatibilityRunner::new(&invoker, &config);
    let err = runner.run(&catalog).await.unwrap_err();
    assert!(matches!(err, HarnessError::Spawn { .. }));
}

#[tokio::test]
async fn rerunning_the_matrix_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, invoker) = scripted_setup(tmp.path(), &["v1.7.5", "v1.8.0", "v1.9.4"]);

    let catalog = discover(&invoker, &config).await;
    let runner = CompatibilityRunner::new(&invoker, &config);
    let first = runner.run(&catalog).await.expect("first run failed");
    let second = runner.run(&catalog).await.expect("second run failed");

    assert_eq!(first.passed, second.passed);
    assert_eq!(first.cases.len(), second.cases.len());
    assert_eq!(first.first_failure, second.first_failure);
    for (a, b) in first.cases.iter().zip(second.cases.iter()) {
        assert_eq!(a.release, b.release);
        assert_eq!(a.direction, b.direction);
        assert_eq!(a.passed(), b.passed());
    }
}
