// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner/coordinator composition specs.
//!
//! An owner expands a recipe into controller children, completes when all
//! of them do, and its deletion cascades (or is refused when a child blocks
//! it).

use super::prelude::*;
use mw_core::{Want, WantStatus};
use serde_json::json;

const TRAVEL_RECIPE: &str = r#"
recipe:
  metadata:
    name: travel
  parameters:
    seats: 1
  wants:
    - metadata: { name: flight, type: generator, labels: { role: svc } }
      spec:
        params: { count: seats }
    - metadata: { name: hotel, type: generator, labels: { role: svc } }
      spec:
        params: { count: seats }
  coordinator:
    metadata: { name: plan, type: coordinator }
    spec:
      params: { required: 2 }
      using:
        - role: svc
"#;

fn owner_manifest(recipe: &std::path::Path) -> mw_core::WantManifest {
    Want::builder()
        .name("trip")
        .type_name("owner")
        .param("recipe", json!(recipe.to_string_lossy()))
        .param("parameters", json!({ "seats": 2 }))
        .manifest()
}

fn write_recipe(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("travel.yaml");
    std::fs::write(&path, TRAVEL_RECIPE).unwrap();
    path
}

#[tokio::test(flavor = "multi_thread")]
async fn owner_completes_after_all_children() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime();
    rt.apply(vec![owner_manifest(&write_recipe(dir.path()))]).unwrap();
    rt.start();

    assert!(wait_status(&rt, "trip", WantStatus::Completed).await);
    for child in ["trip-flight", "trip-hotel", "trip-plan"] {
        assert_eq!(rt.status(child), Some(WantStatus::Completed), "{child}");
    }
    // The coordinator heard from both services.
    let schedules = rt.state_value("trip-plan", "schedules").unwrap();
    assert_eq!(schedules.as_array().unwrap().len(), 2);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn recipe_parameters_substitute_into_children() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime();
    rt.apply(vec![owner_manifest(&write_recipe(dir.path()))]).unwrap();
    rt.start();

    assert!(wait_status(&rt, "trip", WantStatus::Completed).await);
    // seats: 2 flowed into the generator count.
    assert_eq!(rt.state_value("trip-flight", "emitted"), Some(json!(2)));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn owner_deletion_cascades_to_children() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime();
    rt.apply(vec![owner_manifest(&write_recipe(dir.path()))]).unwrap();
    rt.start();
    assert!(wait_for(|| rt.contains("trip-plan")).await);

    rt.delete_want("trip").unwrap();
    assert!(
        wait_for(|| {
            !rt.contains("trip")
                && !rt.contains("trip-flight")
                && !rt.contains("trip-hotel")
                && !rt.contains("trip-plan")
        })
        .await,
        "cascade should remove the whole composition: {:?}",
        rt.statuses()
    );
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn blocking_child_refuses_owner_deletion() {
    let rt = runtime();
    let owner = Want::builder().name("own").type_name("passthrough").manifest();
    let mut child = Want::builder().name("own-c").type_name("passthrough").manifest();
    child.metadata.owner_references.push(mw_core::OwnerReference {
        name: "own".to_string(),
        controller: true,
        block_owner_deletion: true,
    });
    rt.apply(vec![owner, child]).unwrap();
    rt.start();
    assert!(wait_status(&rt, "own", WantStatus::Completed).await);

    let err = rt.delete_want("own").unwrap_err();
    assert!(matches!(err, mw_engine::EngineError::DeletionBlocked { .. }));
    assert!(rt.contains("own"));

    rt.delete_want("own-c").unwrap();
    assert!(wait_for(|| !rt.contains("own-c")).await);
    rt.delete_want("own").unwrap();
    assert!(wait_for(|| !rt.contains("own")).await);
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn reapplying_the_declared_config_keeps_expanded_children() {
    let dir = tempfile::tempdir().unwrap();
    let recipe = write_recipe(dir.path());
    let rt = runtime();
    rt.apply(vec![owner_manifest(&recipe)]).unwrap();
    rt.start();
    assert!(wait_status(&rt, "trip", WantStatus::Completed).await);
    let cycles = rt.cycle_of("trip-plan").unwrap();

    // The declared document only names the owner; its expansion survives.
    rt.apply(vec![owner_manifest(&recipe)]).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(rt.contains("trip-flight"));
    assert!(rt.contains("trip-plan"));
    assert_eq!(rt.cycle_of("trip-plan"), Some(cycles));
    rt.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn children_carry_exactly_one_controller_reference() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime();
    rt.apply(vec![owner_manifest(&write_recipe(dir.path()))]).unwrap();
    rt.start();
    assert!(wait_status(&rt, "trip", WantStatus::Completed).await);

    let snapshot = rt.snapshot();
    for child in ["trip-flight", "trip-hotel", "trip-plan"] {
        let ws = snapshot.get(child).unwrap();
        let controllers: Vec<_> =
            ws.metadata.owner_references.iter().filter(|r| r.controller).collect();
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].name, "trip");
    }
    rt.shutdown().await;
}
