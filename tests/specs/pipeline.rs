// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Linear pipeline specs.
//!
//! generator → queue → sink, declared in YAML: every stage completes and
//! each edge is instantiated exactly once.

use super::prelude::*;
use mw_core::WantStatus;
use serde_json::json;

const PIPELINE: &str = r#"
wants:
  - metadata:
      name: a
      type: generator
      labels: { role: src }
    spec:
      params: { count: 5 }
  - metadata:
      name: b
      type: queue
      labels: { role: q }
    spec:
      params: { service_time: 0 }
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
async fn every_stage_completes() {
    let rt = runtime();
    rt.apply(wants(PIPELINE)).unwrap();
    rt.start();

    assert!(wait_all_completed(&rt).await, "pipeline should settle: {:?}", rt.statuses());
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn all_packets_reach_the_sink() {
    let rt = runtime();
    rt.apply(wants(PIPELINE)).unwrap();
    rt.start();

    assert!(wait_all_completed(&rt).await);
    assert_eq!(rt.state_value("b", "total_processed"), Some(json!(5)));
    assert_eq!(rt.state_value("c", "total_processed"), Some(json!(5)));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn edges_are_instantiated_exactly_once() {
    let rt = runtime();
    rt.apply(wants(PIPELINE)).unwrap();
    rt.reconcile_once().await;

    let a_b = rt.edge_channel("a", "b").expect("edge a->b");
    let b_c = rt.edge_channel("b", "c").expect("edge b->c");
    assert!(rt.edge_channel("a", "c").is_none());

    // Further passes keep the same channel objects.
    rt.reconcile_once().await;
    rt.reconcile_once().await;
    assert!(a_b.same_channel(&rt.edge_channel("a", "b").unwrap()));
    assert!(b_c.same_channel(&rt.edge_channel("b", "c").unwrap()));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unsatisfied_consumers_wait_for_their_producer() {
    let rt = runtime();
    // Sink first, producer missing: it must wait in Idle, not fail.
    rt.apply(wants(
        r#"
wants:
  - metadata: { name: c, type: sink }
    spec:
      using: [ { role: q } ]
"#,
    ))
    .unwrap();
    rt.start();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(rt.status("c"), Some(WantStatus::Idle));
    rt.shutdown().await;
}
