// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic topology specs.
//!
//! Adding a want to a running graph must not disturb existing edges: the
//! surviving channel keeps its identity (and buffered packets), and the new
//! consumer only sees packets emitted after it joined.

use super::prelude::*;
use mw_core::{Want, WantStatus};
use serde_json::json;

const BASE: &str = r#"
wants:
  - metadata:
      name: a
      type: generator
      labels: { role: src }
    spec:
      params: { count: 200 }
  - metadata:
      name: b
      type: queue
      labels: { role: q }
    spec:
      params: { service_time: 0.002 }
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
async fn existing_edge_survives_a_dynamic_add() {
    let rt = runtime();
    rt.apply(wants(BASE)).unwrap();
    rt.start();
    assert!(wait_for(|| rt.status("b") == Some(WantStatus::Running)).await);
    let before = rt.edge_channel("b", "c").unwrap();

    let d = Want::builder().name("d").type_name("sink").using("role", "q").manifest();
    rt.add_want(d).unwrap();
    assert!(wait_for(|| rt.edge_channel("b", "d").is_some()).await);

    let after = rt.edge_channel("b", "c").unwrap();
    assert!(before.same_channel(&after), "b->c must keep its channel");
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn no_packets_are_lost_on_the_surviving_edge() {
    let rt = runtime();
    rt.apply(wants(BASE)).unwrap();
    rt.start();
    assert!(wait_for(|| rt.status("b") == Some(WantStatus::Running)).await);

    let d = Want::builder().name("d").type_name("sink").using("role", "q").manifest();
    rt.add_want(d).unwrap();

    assert!(wait_all_completed(&rt).await, "graph should settle: {:?}", rt.statuses());
    assert_eq!(rt.state_value("c", "total_processed"), Some(json!(200)));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn late_consumer_counts_only_later_packets() {
    let rt = runtime();
    rt.apply(wants(BASE)).unwrap();
    rt.start();

    // Let the pipeline move a meaningful share of the stream first.
    assert!(
        wait_for(|| {
            rt.state_value("b", "total_processed")
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                >= 50
        })
        .await
    );

    let d = Want::builder().name("d").type_name("sink").using("role", "q").manifest();
    rt.add_want(d).unwrap();
    assert!(wait_all_completed(&rt).await);

    let seen_by_d =
        rt.state_value("d", "total_processed").and_then(|v| v.as_u64()).unwrap_or(0);
    assert!(seen_by_d < 200, "late consumer must miss the early packets");
    assert_eq!(rt.state_value("c", "total_processed"), Some(json!(200)));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn consumers_tear_down_before_their_producer() {
    let rt = runtime();
    rt.apply(wants(BASE)).unwrap();
    rt.start();
    assert!(wait_for(|| rt.status("b") == Some(WantStatus::Running)).await);

    // Dropping the whole pipeline: the edges disappear with the wants.
    rt.apply(Vec::new()).unwrap();
    assert!(wait_for(|| rt.statuses().is_empty()).await);
    assert!(rt.edge_channel("a", "b").is_none());
    assert!(rt.edge_channel("b", "c").is_none());
    rt.shutdown().await;
}
