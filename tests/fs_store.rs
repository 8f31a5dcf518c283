// tests/fs_store.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pipedag::engine::{ExecutorOptions, Pipeline};
use pipedag::errors::{PipelineError, StoreError};
use pipedag::fs::mock::MockFileSystem;
use pipedag::fs::{FileSystem, RealFileSystem};
use pipedag::store::{CheckPolicy, CompletionStore, FsCompletionStore, MarkerLocks};
use pipedag::task::Marker;
use pipedag_test_utils::fake_task::FakeGraph;
use pipedag_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn markers_round_trip_through_a_real_directory() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store = FsCompletionStore::new(dir.path());
    let marker = Marker::from("wiki/extract/_SUCCESS");

    assert!(!store.exists(&marker).await?);
    store.record(&marker, "extract\n").await?;
    assert!(store.exists(&marker).await?);

    let on_disk = std::fs::read_to_string(dir.path().join("wiki/extract/_SUCCESS"))?;
    assert_eq!(on_disk, "extract\n");
    Ok(())
}

#[tokio::test]
async fn url_scheme_is_stripped() -> TestResult {
    let store = FsCompletionStore::new("/var/markers");

    let path = store.path_for(&Marker::from("s3://bucket/wiki/transform"))?;
    assert_eq!(path, Path::new("/var/markers/bucket/wiki/transform"));

    let plain = store.path_for(&Marker::from("/abs/output"))?;
    assert_eq!(plain, Path::new("/var/markers/abs/output"));
    Ok(())
}

#[tokio::test]
async fn escaping_or_empty_markers_are_rejected() -> TestResult {
    let store = FsCompletionStore::new("/var/markers");

    let escape = store.path_for(&Marker::from("out/../../etc/passwd"));
    assert!(matches!(escape, Err(StoreError::InvalidMarker { .. })));

    let empty = store.path_for(&Marker::from("s3://"));
    assert!(matches!(empty, Err(StoreError::InvalidMarker { .. })));

    // Invalid markers are not transient; checking one fails immediately.
    let err = store
        .exists(&Marker::from("../outside"))
        .await
        .expect_err("invalid marker");
    assert!(!err.is_transient());
    Ok(())
}

#[tokio::test]
async fn existing_directory_counts_as_present() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("wiki/output"))?;
    let store = FsCompletionStore::new(dir.path());

    assert!(store.exists(&Marker::from("wiki/output")).await?);
    Ok(())
}

#[tokio::test]
async fn unreachable_backend_is_a_transient_error_not_absence() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let store = FsCompletionStore::with_fs("/markers", Arc::new(fs.clone()));
    let marker = Marker::from("out/a");

    fs.make_unreachable("/markers/out/a");
    let err = store.exists(&marker).await.expect_err("outage");
    assert!(err.is_transient());

    fs.restore("/markers/out/a");
    assert!(!store.exists(&marker).await?);
    Ok(())
}

#[tokio::test]
async fn outage_during_resolution_aborts_before_anything_runs() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let store = FsCompletionStore::with_fs("/markers", Arc::new(fs.clone()));
    fs.make_unreachable("/markers/out/b");

    let graph = FakeGraph::new();
    graph.add("A", &[], &["out/a"]);
    graph.add("B", &["A"], &["out/b"]);

    let pipeline = Pipeline::new(
        Arc::new(store),
        ExecutorOptions {
            workers: 1,
            check_policy: CheckPolicy {
                attempts: 2,
                backoff: Duration::from_millis(1),
            },
        },
    );

    let err = pipeline.run(graph.get("B")).await.expect_err("outage");
    assert!(matches!(err, PipelineError::CompletionCheck { .. }));
    assert!(graph.runs().is_empty());
    Ok(())
}

#[tokio::test]
async fn read_only_backend_reports_marker_write_failure() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.set_read_only(true);
    let store = FsCompletionStore::with_fs("/markers", Arc::new(fs.clone()));

    let graph = FakeGraph::new();
    graph.add("A", &[], &["out/a"]);

    let err = Pipeline::new(Arc::new(store), ExecutorOptions::default())
        .run(graph.get("A"))
        .await
        .expect_err("write fails");

    match err {
        PipelineError::MarkerWrite { marker, source, .. } => {
            assert_eq!(marker.as_str(), "out/a");
            assert!(source.is_transient());
        }
        other => panic!("expected MarkerWrite, got {other:?}"),
    }
    assert_eq!(graph.runs(), vec!["A"]);
    assert!(fs.contents("/markers/out/a").is_none());
    Ok(())
}

#[tokio::test]
async fn pipeline_against_mock_fs_writes_marker_contents() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("/markers/out/a", "pre-existing");
    let store = FsCompletionStore::with_fs("/markers", Arc::new(fs.clone()));

    let graph = FakeGraph::new();
    graph.add("A", &[], &["out/a"]);
    graph.add("B", &["A"], &["out/b"]);

    let report = Pipeline::new(Arc::new(store), ExecutorOptions::default())
        .run(graph.get("B"))
        .await?;

    assert_eq!(graph.runs(), vec!["B"]);
    assert_eq!(report.skipped().len(), 1);
    assert_eq!(fs.contents("/markers/out/b"), Some(b"B\n".to_vec()));
    Ok(())
}

#[tokio::test]
async fn marker_locks_serialise_overlapping_sets() -> TestResult {
    let locks = MarkerLocks::new();
    let a = Marker::from("out/a");
    let b = Marker::from("out/b");

    let guard = locks.acquire(&[b.clone(), a.clone()]).await;

    let contender = {
        let locks = locks.clone();
        let a = a.clone();
        tokio::spawn(async move {
            let _g = locks.acquire(&[a]).await;
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!contender.is_finished(), "lock on out/a must be held");

    // Disjoint markers are not blocked.
    let _other = locks.acquire(&[Marker::from("out/c")]).await;

    drop(guard);
    tokio::time::timeout(Duration::from_secs(1), contender).await??;
    Ok(())
}

#[tokio::test]
async fn marker_lock_table_forgets_released_markers() -> TestResult {
    let locks = MarkerLocks::new();
    let a = Marker::from("out/a");

    let guard = locks.acquire(&[a.clone(), Marker::from("out/b")]).await;
    assert_eq!(locks.len(), 2);

    let waiter = {
        let locks = locks.clone();
        let a = a.clone();
        tokio::spawn(async move {
            let _g = locks.acquire(&[a]).await;
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(guard);
    // `out/a` is still wanted by the waiter; `out/b` is gone.
    assert!(locks.len() <= 1);

    tokio::time::timeout(Duration::from_secs(1), waiter).await??;
    assert!(locks.is_empty());

    for day in 0..50 {
        let _g = locks.acquire(&[Marker::from(format!("daily/{day}"))]).await;
    }
    assert!(locks.is_empty());
    Ok(())
}

#[test]
fn concurrent_writes_to_markers_sharing_a_stem_stay_separate() -> TestResult {
    let dir = tempfile::tempdir()?;
    let csv = dir.path().join("out/report.csv");
    let json = dir.path().join("out/report.json");

    for round in 0..100 {
        let handles: Vec<_> = [(csv.clone(), "csv"), (json.clone(), "json")]
            .into_iter()
            .map(|(path, label)| {
                std::thread::spawn(move || {
                    RealFileSystem.write(&path, format!("{label} {round}").as_bytes())
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread")?;
        }

        assert_eq!(std::fs::read_to_string(&csv)?, format!("csv {round}"));
        assert_eq!(std::fs::read_to_string(&json)?, format!("json {round}"));
    }

    // No temp files are left next to the markers.
    let leftovers = std::fs::read_dir(dir.path().join("out"))?.count();
    assert_eq!(leftovers, 2);
    Ok(())
}

#[tokio::test]
async fn sibling_tasks_with_markers_sharing_a_stem_run_concurrently() -> TestResult {
    init_tracing();
    for _ in 0..25 {
        let dir = tempfile::tempdir()?;
        let store = FsCompletionStore::new(dir.path());

        let graph = FakeGraph::new();
        graph.add("csv", &[], &["out/report.csv"]);
        graph.add("json", &[], &["out/report.json"]);
        graph.add("done", &["csv", "json"], &["out/report"]);

        let report = Pipeline::new(
            Arc::new(store),
            ExecutorOptions {
                workers: 2,
                check_policy: CheckPolicy::no_retry(),
            },
        )
        .run(graph.get("done"))
        .await?;

        assert!(report.is_success());
        let out = dir.path().join("out");
        assert_eq!(std::fs::read_to_string(out.join("report.csv"))?, "csv\n");
        assert_eq!(std::fs::read_to_string(out.join("report.json"))?, "json\n");
        assert_eq!(std::fs::read_to_string(out.join("report"))?, "done\n");
    }
    Ok(())
}
