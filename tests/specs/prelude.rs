// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the spec suite.

#![allow(dead_code)]

use mw_config::ConfigFile;
use mw_core::{WantManifest, WantStatus};
use mw_engine::{Runtime, RuntimeConfig};
use std::time::Duration;

pub const SPEC_WAIT_MAX_MS: u64 = 5_000;

/// A runtime tuned for spec cadence (10 ms ticks).
pub fn runtime() -> Runtime {
    Runtime::new(config())
}

pub fn config() -> RuntimeConfig {
    RuntimeConfig::default()
        .tick(Duration::from_millis(10))
        .idle_pause(Duration::from_millis(1))
}

/// Parse a YAML want config into manifests (no recipe references).
pub fn wants(doc: &str) -> Vec<WantManifest> {
    ConfigFile::parse(doc)
        .expect("spec config parses")
        .resolve(std::path::Path::new("."))
        .expect("spec config resolves")
}

/// Poll `pred` until it holds or the spec budget elapses.
pub async fn wait_for(mut pred: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    loop {
        if pred() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until `name` reaches `status`.
pub async fn wait_status(runtime: &Runtime, name: &str, status: WantStatus) -> bool {
    wait_for(|| runtime.status(name) == Some(status)).await
}

/// Wait until every live want is Completed.
pub async fn wait_all_completed(runtime: &Runtime) -> bool {
    wait_for(|| {
        let statuses = runtime.statuses();
        !statuses.is_empty() && statuses.values().all(|s| *s == WantStatus::Completed)
    })
    .await
}
