// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime tuning knobs.

use std::path::PathBuf;
use std::time::Duration;

/// Tuning for a [`crate::Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Reconciler tick period.
    pub tick: Duration,
    /// Bounded capacity of every edge channel.
    pub channel_capacity: usize,
    /// Soft deadline per exec cycle.
    pub cycle_deadline: Duration,
    /// Exec errors tolerated before a want is marked Failed.
    pub error_threshold: u32,
    /// Cycle timeouts tolerated before a want is marked Failed.
    pub timeout_threshold: u32,
    /// Cooperative pause after a cycle that did no I/O and no state change.
    pub idle_pause: Duration,
    /// In-process history bound per want.
    pub history_cap: usize,
    /// History entries persisted per want in snapshots.
    pub snapshot_history: usize,
    /// Per-subscriber notification buffer bound.
    pub inbox_capacity: usize,
    /// Snapshot file; `None` disables persistence.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            channel_capacity: 64,
            cycle_deadline: Duration::from_secs(5),
            error_threshold: 3,
            timeout_threshold: 3,
            idle_pause: Duration::from_millis(2),
            history_cap: 256,
            snapshot_history: 32,
            inbox_capacity: 128,
            snapshot_path: None,
        }
    }
}

impl RuntimeConfig {
    mw_core::setters! {
        set {
            tick: Duration,
            channel_capacity: usize,
            cycle_deadline: Duration,
            error_threshold: u32,
            timeout_threshold: u32,
            idle_pause: Duration,
            history_cap: usize,
            snapshot_history: usize,
            inbox_capacity: usize,
        }
        option {
            snapshot_path: PathBuf,
        }
    }
}
