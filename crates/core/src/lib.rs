// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mw-core: Domain types for the MyWant workflow engine

pub mod macros;

pub mod clock;
pub mod history;
pub mod id;
pub mod label;
pub mod notify;
pub mod owner;
pub mod path;
pub mod status;
pub mod want;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use history::{HistoryEntry, HistoryKind};
pub use id::short;
pub use label::{Labels, Selector};
pub use notify::{Notification, ParameterChange, StateNotification};
pub use owner::{validate_owner_dag, OwnerCycle, OwnerReference};
pub use path::{edge_name, Connectivity, ConnectivityIssue, Packet};
pub use status::WantStatus;
#[cfg(any(test, feature = "test-support"))]
pub use want::WantBuilder;
pub use want::{
    CycleCommit, CycleStart, ManifestError, Params, StatusChange, Want, WantError, WantManifest,
    WantMeta, WantSpec,
};
