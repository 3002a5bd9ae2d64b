// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification payloads fanned out to subscribers.
//!
//! Serializes with `{"type": "kind:name", ...fields}` format, matching the
//! wire shape used in snapshots and logs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single committed state key, published at EndCycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateNotification {
    pub source: String,
    pub key: String,
    pub value: Value,
    pub cycle: u64,
}

/// A parameter update staged for a want, observed at its next cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub source: String,
    pub changes: IndexMap<String, Value>,
}

/// Events delivered to subscriber inboxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "state:changed")]
    State(StateNotification),

    #[serde(rename = "param:changed")]
    Parameter(ParameterChange),

    /// A controller child reached Completed; delivered to its owner.
    #[serde(rename = "child:completed")]
    ChildCompleted { child: String },
}

impl Notification {
    /// The want that produced this notification.
    pub fn source(&self) -> &str {
        match self {
            Notification::State(n) => &n.source,
            Notification::Parameter(p) => &p.source,
            Notification::ChildCompleted { child } => child,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::State(_) => "state:changed",
            Notification::Parameter(_) => "param:changed",
            Notification::ChildCompleted { .. } => "child:completed",
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
