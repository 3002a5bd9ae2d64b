// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retrigger specs.
//!
//! A completed consumer must come back through Idle when an upstream that
//! already completed produces again, and consume the new data in arrival
//! order.

use super::prelude::*;
use mw_core::WantStatus;
use serde_json::json;

const PAIR: &str = r#"
wants:
  - metadata:
      name: p
      type: generator
      labels: { role: p }
    spec:
      params: { count: 1 }
  - metadata:
      name: c
      type: sink
    spec:
      using:
        - role: p
"#;

async fn settled_pair() -> mw_engine::Runtime {
    let rt = runtime();
    rt.apply(wants(PAIR)).unwrap();
    rt.start();
    assert!(wait_all_completed(&rt).await);
    rt
}

#[tokio::test(flavor = "multi_thread")]
async fn completed_consumer_reruns_on_new_upstream_data() {
    let rt = settled_pair().await;
    assert_eq!(rt.state_value("c", "total_processed"), Some(json!(1)));

    // Externally raise the producer's target and re-arm it.
    rt.store_state("p", "count", json!(2)).unwrap();
    rt.set_status("p", WantStatus::Idle).unwrap();

    assert!(
        wait_for(|| rt.state_value("c", "total_processed") == Some(json!(2))).await,
        "consumer should consume the second packet"
    );
    assert!(wait_status(&rt, "c", WantStatus::Completed).await);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn retrigger_adds_exactly_one_consuming_cycle() {
    let rt = settled_pair().await;
    let before = rt.state_value("c", "cycle_count").and_then(|v| v.as_u64()).unwrap();

    rt.store_state("p", "count", json!(2)).unwrap();
    rt.set_status("p", WantStatus::Idle).unwrap();
    assert!(
        wait_for(|| {
            rt.state_value("c", "total_processed") == Some(json!(2))
                && rt.status("c") == Some(WantStatus::Completed)
        })
        .await
    );

    let after = rt.state_value("c", "cycle_count").and_then(|v| v.as_u64()).unwrap();
    assert_eq!(after, before + 1);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rearm_goes_through_idle_not_straight_to_running() {
    let rt = settled_pair().await;
    // Completed → Running directly is forbidden; retrigger passes Idle.
    let err = rt.set_status("c", WantStatus::Running).unwrap_err();
    assert!(matches!(err, mw_engine::EngineError::Want(_)));
    assert_eq!(rt.status("c"), Some(WantStatus::Completed));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn suspended_want_is_not_rearmed() {
    let rt = settled_pair().await;
    rt.suspend("c").unwrap();

    rt.store_state("p", "count", json!(2)).unwrap();
    rt.set_status("p", WantStatus::Idle).unwrap();
    assert!(wait_status(&rt, "p", WantStatus::Completed).await);

    // The packet stays buffered while the consumer is suspended.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(rt.status("c"), Some(WantStatus::Suspended));
    assert_eq!(rt.state_value("c", "total_processed"), Some(json!(1)));

    // Resuming releases it: the consumer re-arms and consumes.
    rt.resume("c").unwrap();
    assert!(
        wait_for(|| rt.state_value("c", "total_processed") == Some(json!(2))).await
    );
    rt.shutdown().await;
}
