// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-in coordinator specs.
//!
//! Three independent producers, one coordinator requiring all three inputs.

use super::prelude::*;
use mw_core::WantStatus;

const FAN_IN: &str = r#"
wants:
  - metadata: { name: r, type: generator, labels: { role: svc } }
    spec:
      params: { count: 1 }
  - metadata: { name: h, type: generator, labels: { role: svc } }
    spec:
      params: { count: 1 }
  - metadata: { name: f, type: generator, labels: { role: svc } }
    spec:
      params: { count: 1 }
  - metadata: { name: k, type: coordinator }
    spec:
      params: { required: 3 }
      using:
        - role: svc
"#;

#[tokio::test(flavor = "multi_thread")]
async fn coordinator_completes_after_quorum() {
    let rt = runtime();
    rt.apply(wants(FAN_IN)).unwrap();
    rt.start();

    assert!(wait_status(&rt, "k", WantStatus::Completed).await);
    let schedules = rt.state_value("k", "schedules").unwrap();
    assert_eq!(schedules.as_array().unwrap().len(), 3);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn coordinator_waits_for_every_required_input() {
    let rt = runtime();
    // Only two of the three required services exist yet.
    let mut declared = wants(FAN_IN);
    declared.retain(|m| m.name() != "f");
    rt.apply(declared).unwrap();
    rt.start();

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_eq!(rt.status("k"), Some(WantStatus::Running));

    // The third service arrives; the coordinator completes.
    rt.apply(wants(FAN_IN)).unwrap();
    assert!(wait_status(&rt, "k", WantStatus::Completed).await);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn schedules_capture_one_entry_per_source() {
    let rt = runtime();
    rt.apply(wants(FAN_IN)).unwrap();
    rt.start();

    assert!(wait_status(&rt, "k", WantStatus::Completed).await);
    let schedules = rt.state_value("k", "schedules").unwrap();
    let mut sources: Vec<String> = schedules
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["source"].as_str().unwrap().to_string())
        .collect();
    sources.sort();
    assert_eq!(sources, vec!["f".to_string(), "h".to_string(), "r".to_string()]);
    rt.shutdown().await;
}
