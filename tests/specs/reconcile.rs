// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciliation ordering and idempotence specs.

use super::prelude::*;
use mw_core::{Want, WantStatus};
use serde_json::json;

const PIPELINE: &str = r#"
wants:
  - metadata:
      name: a
      type: generator
      labels: { role: src }
    spec:
      params: { count: 3 }
  - metadata:
      name: b
      type: queue
      labels: { role: q }
    spec:
      using:
        - role: src
  - metadata:
      name: c
      type: sink
    spec:
      using:
        - role: q
"#;

#[tokio::test(flavor = "multi_thread")]
async fn reapplying_the_same_config_restarts_nothing() {
    let rt = runtime();
    rt.apply(wants(PIPELINE)).unwrap();
    rt.start();
    assert!(wait_all_completed(&rt).await);
    let cycles: Vec<_> =
        ["a", "b", "c"].iter().map(|n| rt.cycle_of(n).unwrap()).collect();

    for _ in 0..3 {
        rt.apply(wants(PIPELINE)).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    let after: Vec<_> = ["a", "b", "c"].iter().map(|n| rt.cycle_of(n).unwrap()).collect();
    assert_eq!(cycles, after);
    assert!(rt.statuses().values().all(|s| *s == WantStatus::Completed));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn producers_start_no_later_than_their_consumers() {
    let rt = runtime();
    rt.apply(wants(PIPELINE)).unwrap();
    rt.reconcile_once().await;

    // One pass starts the whole ready set, sources first; nobody with
    // satisfied connectivity is left behind its consumers.
    let statuses = rt.statuses();
    for name in ["a", "b", "c"] {
        assert_ne!(statuses.get(name), Some(&WantStatus::Idle), "{name} not started");
    }
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn structural_update_recreates_the_want() {
    let rt = runtime();
    rt.apply(wants(PIPELINE)).unwrap();
    rt.start();
    assert!(wait_all_completed(&rt).await);

    // Changing labels is structural: the want is deleted and re-added, so
    // its cycle counter restarts.
    let mut updated = wants(PIPELINE);
    updated[0].metadata.labels.insert("tier".to_string(), "gold".to_string());
    rt.apply(updated).unwrap();

    assert!(
        wait_for(|| {
            rt.snapshot()
                .get("a")
                .map(|w| w.metadata.labels.contains_key("tier"))
                .unwrap_or(false)
        })
        .await
    );
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn a_bad_edit_does_not_abort_the_pass() {
    let rt = runtime();
    rt.apply(wants(PIPELINE)).unwrap();
    rt.start();
    assert!(wait_all_completed(&rt).await);

    // Add one broken want plus one good one in the same edit.
    let broken = Want::builder().name("u").type_name("nope").manifest();
    let good = Want::builder()
        .name("d")
        .type_name("sink")
        .using("role", "q")
        .manifest();
    rt.add_want(broken).unwrap();
    rt.add_want(good).unwrap();

    assert!(wait_status(&rt, "u", WantStatus::Failed).await);
    assert!(wait_for(|| rt.contains("d")).await);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn global_selectors_append_after_local_inputs() {
    let rt = runtime();
    rt.apply(wants(
        r#"
wants:
  - metadata: { name: local-src, type: generator, labels: { role: near } }
    spec:
      params: { count: 1 }
  - metadata: { name: global-src, type: generator, labels: { role: far } }
    spec:
      params: { count: 1 }
  - metadata: { name: c, type: sink }
    spec:
      using:
        - role: near
      usingGlobal:
        - role: far
"#,
    ))
    .unwrap();
    rt.reconcile_once().await;

    // Both edge flavors exist under their canonical names.
    assert!(rt.edge_channel("local-src", "c").is_some());
    assert!(rt.edge_channel("global-src", "c").is_none(), "global edge has its own name");
    rt.start();
    assert!(wait_status(&rt, "c", WantStatus::Completed).await);
    assert_eq!(
        rt.state_value("c", "total_processed").and_then(|v| v.as_u64()),
        Some(2)
    );
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn state_changes_are_only_visible_at_commit() {
    let rt = runtime();
    rt.apply(wants(PIPELINE)).unwrap();
    let watcher = rt.watch();
    rt.start();
    assert!(wait_all_completed(&rt).await);
    rt.shutdown().await;

    // Every published value matches the committed state for its cycle:
    // the final notification per key equals the final state.
    let mut last_emitted = None;
    for n in watcher.drain() {
        if let mw_core::Notification::State(s) = n {
            if s.source == "a" && s.key == "emitted" {
                last_emitted = Some(s.value);
            }
        }
    }
    assert_eq!(last_emitted, Some(json!(3)));
    assert_eq!(rt.state_value("a", "emitted"), Some(json!(3)));
}
