// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_helpers::{fast_runtime, wait_for};
use mw_core::{Want, WantManifest, WantStatus};
use serde_json::json;

fn service(name: &str) -> WantManifest {
    Want::builder()
        .name(name)
        .type_name("generator")
        .label("role", "svc")
        .param("count", 1)
        .manifest()
}

fn coordinator(name: &str, required: i64) -> WantManifest {
    Want::builder()
        .name(name)
        .type_name("coordinator")
        .param("required", required)
        .using("role", "svc")
        .manifest()
}

#[tokio::test(flavor = "multi_thread")]
async fn completes_once_every_source_delivers() {
    let runtime = fast_runtime();
    runtime
        .apply(vec![service("r"), service("h"), service("f"), coordinator("k", 3)])
        .unwrap();
    runtime.start();

    assert!(wait_for(3_000, || runtime.status("k") == Some(WantStatus::Completed)).await);
    let schedules = runtime.state_value("k", "schedules").unwrap();
    assert_eq!(schedules.as_array().unwrap().len(), 3);
    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn quorum_below_input_count_suffices() {
    let runtime = fast_runtime();
    runtime
        .apply(vec![service("a"), service("b"), service("c"), coordinator("k", 2)])
        .unwrap();
    runtime.start();

    assert!(wait_for(3_000, || runtime.status("k") == Some(WantStatus::Completed)).await);
    let sources = runtime.state_value("k", "sources").and_then(|v| v.as_u64()).unwrap();
    assert!(sources >= 2);
    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn required_zero_means_all_inputs() {
    let runtime = fast_runtime();
    runtime.apply(vec![service("a"), service("b"), coordinator("k", 0)]).unwrap();
    runtime.start();

    assert!(wait_for(3_000, || runtime.status("k") == Some(WantStatus::Completed)).await);
    assert_eq!(
        runtime.state_value("k", "schedules").unwrap().as_array().unwrap().len(),
        2
    );
    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn stays_running_until_quorum() {
    let runtime = fast_runtime();
    // Two services exist but three are required; add the third later.
    runtime
        .apply(vec![service("a"), service("b"), coordinator("k", 3)])
        .unwrap();
    runtime.start();
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_eq!(runtime.status("k"), Some(WantStatus::Running));

    runtime.add_want(service("c")).unwrap();
    assert!(wait_for(3_000, || runtime.status("k") == Some(WantStatus::Completed)).await);
    runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn a_retriggering_child_replaces_its_schedule_entry() {
    let runtime = fast_runtime();
    runtime.apply(vec![service("a"), service("b"), coordinator("k", 2)]).unwrap();
    runtime.start();
    assert!(wait_for(3_000, || runtime.status("k") == Some(WantStatus::Completed)).await);

    // Rebook: service `a` emits a second packet.
    runtime.store_state("a", "count", json!(2)).unwrap();
    runtime.set_status("a", WantStatus::Idle).unwrap();

    assert!(
        wait_for(3_000, || {
            let schedules = runtime
                .state_value("k", "schedules")
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            runtime.status("k") == Some(WantStatus::Completed)
                && schedules.iter().any(|s| {
                    s["source"] == json!("a") && s["payload"]["seq"] == json!(1)
                })
        })
        .await
    );
    // Still one entry per source.
    assert_eq!(
        runtime.state_value("k", "schedules").unwrap().as_array().unwrap().len(),
        2
    );
    runtime.shutdown().await;
}
