// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests.

use crate::config::RuntimeConfig;
use crate::runtime::Runtime;
use mw_core::{SystemClock, WantManifest};
use std::time::Duration;

/// Poll `pred` until it holds or `timeout_ms` elapses.
pub(crate) async fn wait_for(timeout_ms: u64, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
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

/// A runtime tuned for fast test cadence.
pub(crate) fn fast_runtime() -> Runtime<SystemClock> {
    Runtime::new(fast_config())
}

pub(crate) fn fast_config() -> RuntimeConfig {
    RuntimeConfig::default()
        .tick(Duration::from_millis(10))
        .idle_pause(Duration::from_millis(1))
}

/// generator(count) labeled role=src.
pub(crate) fn generator(name: &str, count: u64) -> WantManifest {
    mw_core::Want::builder()
        .name(name)
        .type_name("generator")
        .label("role", "src")
        .param("count", count as i64)
        .manifest()
}

/// sink consuming role=src.
pub(crate) fn sink(name: &str) -> WantManifest {
    mw_core::Want::builder()
        .name(name)
        .type_name("sink")
        .using("role", "src")
        .manifest()
}
