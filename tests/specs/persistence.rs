// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence and restart specs.
//!
//! Snapshot → restart → snapshot must round-trip everything except timing,
//! and a restart with unchanged declared config must not rerun anything.

use super::prelude::*;
use mw_core::WantStatus;
use mw_engine::Runtime;
use mw_storage::SnapshotStore;
use serde_json::json;

const PIPELINE: &str = r#"
wants:
  - metadata:
      name: gen
      type: generator
      labels: { role: src }
    spec:
      params: { count: 4 }
  - metadata:
      name: collect
      type: sink
    spec:
      using:
        - role: src
"#;

async fn run_to_completion(snapshot: &std::path::Path) {
    let rt = Runtime::new(config().snapshot_path(snapshot.to_path_buf()));
    rt.apply(wants(PIPELINE)).unwrap();
    rt.start();
    assert!(wait_all_completed(&rt).await);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn reconciler_persists_snapshots_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    run_to_completion(&path).await;

    let snapshot = SnapshotStore::new(&path).load().unwrap().unwrap();
    assert_eq!(snapshot.wants.len(), 2);
    let collect = snapshot.get("collect").unwrap();
    assert_eq!(collect.status, WantStatus::Completed);
    assert_eq!(collect.state.get("total_processed"), Some(&json!(4)));
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_restores_status_state_and_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    run_to_completion(&path).await;
    let saved = SnapshotStore::new(&path).load().unwrap().unwrap();

    let rt = Runtime::new(config());
    rt.recover(&saved).unwrap();
    assert_eq!(rt.status("gen"), Some(WantStatus::Completed));
    assert_eq!(rt.status("collect"), Some(WantStatus::Completed));
    assert_eq!(rt.state_value("gen", "emitted"), Some(json!(4)));
    assert_eq!(rt.cycle_of("gen"), saved.get("gen").map(|w| w.cycle));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_with_unchanged_config_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    run_to_completion(&path).await;
    let saved = SnapshotStore::new(&path).load().unwrap().unwrap();

    let rt = Runtime::new(config());
    rt.recover(&saved).unwrap();
    let cycles_before = rt.cycle_of("collect").unwrap();

    rt.start();
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_eq!(rt.status("collect"), Some(WantStatus::Completed));
    assert_eq!(rt.cycle_of("collect"), Some(cycles_before));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_round_trips_apart_from_timing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    run_to_completion(&path).await;
    let saved = SnapshotStore::new(&path).load().unwrap().unwrap();

    let rt = Runtime::new(config());
    rt.recover(&saved).unwrap();
    let again = rt.snapshot();
    rt.shutdown().await;

    assert_eq!(again.wants.len(), saved.wants.len());
    for (a, b) in again.wants.iter().zip(saved.wants.iter()) {
        assert_eq!(a.metadata, b.metadata);
        assert_eq!(a.spec, b.spec);
        assert_eq!(a.status, b.status);
        assert_eq!(a.state, b.state);
        assert_eq!(a.cycle, b.cycle);
        assert_eq!(a.history_tail, b.history_tail);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_continues_interrupted_work() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    // First run is cut short mid-stream.
    {
        let rt = Runtime::new(config().snapshot_path(path.clone()));
        let mut declared = wants(PIPELINE);
        declared[0].spec.params.insert("count".to_string(), json!(100_000));
        rt.apply(declared).unwrap();
        rt.start();
        assert!(
            wait_for(|| {
                rt.state_value("collect", "total_processed")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0)
                    > 10
            })
            .await
        );
        rt.shutdown().await;
    }

    // Second run resumes from the snapshot and keeps counting.
    let saved = SnapshotStore::new(&path).load().unwrap().unwrap();
    let rt = Runtime::new(config());
    rt.recover(&saved).unwrap();
    let resumed_from = saved
        .get("collect")
        .and_then(|w| w.state.get("total_processed"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    rt.start();
    assert!(
        wait_for(|| {
            rt.state_value("collect", "total_processed")
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                > resumed_from
        })
        .await,
        "restarted pipeline should make progress"
    );
    rt.shutdown().await;
}
