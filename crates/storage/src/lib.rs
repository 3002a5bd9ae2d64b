// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mw-storage: snapshot persistence for the MyWant runtime.
//!
//! On every reconciliation pass the runtime serialises the full want set;
//! on startup an existing snapshot is loaded back as the initial
//! last-applied config so restarts are idempotent for unchanged declared
//! configuration.

mod snapshot;

pub use snapshot::{Snapshot, SnapshotError, SnapshotStore, WantSnapshot, SNAPSHOT_VERSION};
