// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parameter propagation specs.
//!
//! A parameter update on an owner reaches its controller children between
//! cycles: visible from the next cycle onward, never mid-cycle, and logged
//! in the child's history.

use super::prelude::*;
use mw_core::{HistoryKind, WantStatus};
use serde_json::json;

const OWNED: &str = r#"
wants:
  - metadata:
      name: o
      type: generator
      labels: { role: src }
    spec:
      params: { count: 1000000 }
  - metadata:
      name: x
      type: sink
      ownerReferences:
        - name: o
          controller: true
    spec:
      using:
        - role: src
"#;

fn param_change_entry(rt: &mw_engine::Runtime, want: &str, key: &str) -> Option<(u64, serde_json::Value)> {
    rt.history(want)?.into_iter().find_map(|e| {
        if e.kind == HistoryKind::ParameterChange {
            e.changes.get(key).map(|v| (e.cycle, v.clone()))
        } else {
            None
        }
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn child_observes_the_update_at_its_next_cycle() {
    let rt = runtime();
    rt.apply(wants(OWNED)).unwrap();
    rt.start();
    assert!(wait_status(&rt, "x", WantStatus::Running).await);

    let cycle_at_update = rt.cycle_of("x").unwrap();
    rt.update_parameter("o", "k", json!("v")).unwrap();

    assert!(
        wait_for(|| param_change_entry(&rt, "x", "k").is_some()).await,
        "child should log the parameter change"
    );
    let (observed_cycle, value) = param_change_entry(&rt, "x", "k").unwrap();
    assert_eq!(value, json!("v"));
    // Never visible in the cycle that was already open at update time.
    assert!(observed_cycle > cycle_at_update);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn owner_itself_logs_the_change_too() {
    let rt = runtime();
    rt.apply(wants(OWNED)).unwrap();
    rt.start();
    assert!(wait_status(&rt, "o", WantStatus::Running).await);

    rt.update_parameter("o", "k", json!(7)).unwrap();
    assert!(wait_for(|| param_change_entry(&rt, "o", "k").is_some()).await);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn params_only_config_update_notifies_children() {
    let rt = runtime();
    rt.apply(wants(OWNED)).unwrap();
    rt.start();
    assert!(wait_status(&rt, "x", WantStatus::Running).await);

    // Re-declare the owner with a different param: a params-only diff.
    let mut updated = wants(OWNED);
    updated[0].spec.params.insert("count".to_string(), json!(2000000));
    rt.apply(updated).unwrap();

    assert!(
        wait_for(|| param_change_entry(&rt, "x", "count").is_some()).await,
        "child should hear about the params-only config update"
    );
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn non_children_are_not_notified() {
    let rt = runtime();
    let mut declared = wants(OWNED);
    // Strip the owner reference: x is now unrelated to o.
    declared[1].metadata.owner_references.clear();
    rt.apply(declared).unwrap();
    rt.start();
    assert!(wait_status(&rt, "x", WantStatus::Running).await);

    rt.update_parameter("o", "k", json!("v")).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert!(param_change_entry(&rt, "x", "k").is_none());
    rt.shutdown().await;
}
