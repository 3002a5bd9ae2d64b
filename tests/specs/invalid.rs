// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invalid want specs.
//!
//! A bad want fails with a message; the rest of the graph and the
//! reconciler keep going.

use super::prelude::*;
use mw_core::WantStatus;
use serde_json::json;

const MIXED: &str = r#"
wants:
  - metadata:
      name: gen
      type: generator
      labels: { role: src }
    spec:
      params: { count: 3 }
  - metadata:
      name: collect
      type: sink
    spec:
      using:
        - role: src
  - metadata:
      name: u
      type: warp-drive
"#;

#[tokio::test(flavor = "multi_thread")]
async fn unknown_type_fails_with_a_naming_message() {
    let rt = runtime();
    rt.apply(wants(MIXED)).unwrap();
    rt.start();

    assert!(wait_status(&rt, "u", WantStatus::Failed).await);
    let error = rt.state_value("u", "error").unwrap();
    assert!(
        error.as_str().unwrap().contains("warp-drive"),
        "error should name the missing type: {error}"
    );
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn other_wants_continue_past_the_failure() {
    let rt = runtime();
    rt.apply(wants(MIXED)).unwrap();
    rt.start();

    assert!(wait_status(&rt, "collect", WantStatus::Completed).await);
    assert_eq!(rt.state_value("collect", "total_processed"), Some(json!(3)));
    assert_eq!(rt.status("u"), Some(WantStatus::Failed));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn reconciler_passes_keep_completing() {
    let rt = runtime();
    rt.apply(wants(MIXED)).unwrap();
    rt.start();
    assert!(wait_status(&rt, "u", WantStatus::Failed).await);

    // A later config change still applies normally.
    let gen2 = mw_core::Want::builder()
        .name("gen2")
        .type_name("generator")
        .label("role", "src")
        .param("count", 1)
        .manifest();
    rt.add_want(gen2).unwrap();
    assert!(wait_status(&rt, "gen2", WantStatus::Completed).await);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn registering_the_type_later_heals_new_declarations() {
    let rt = runtime();
    rt.apply(wants(MIXED)).unwrap();
    rt.reconcile_once().await;
    assert_eq!(rt.status("u"), Some(WantStatus::Failed));

    // The failed want stays failed (recovery is a config re-apply), but a
    // newly declared want of the now-registered type works.
    rt.registry().register(
        mw_config::WantTypeDefinition::new("warp-drive"),
        mw_engine::WantRole::Independent,
        std::sync::Arc::new(|_| Box::new(mw_engine::builtin::Passthrough)),
    );
    let fresh = mw_core::Want::builder().name("u2").type_name("warp-drive").manifest();
    rt.add_want(fresh).unwrap();
    rt.start();
    assert!(wait_status(&rt, "u2", WantStatus::Completed).await);
    assert_eq!(rt.status("u"), Some(WantStatus::Failed));
    rt.shutdown().await;
}
