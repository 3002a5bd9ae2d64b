// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only change history per want.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// State keys committed at the end of a cycle.
    StateCommit,
    /// Parameters swapped in at the start of a cycle.
    ParameterChange,
    /// A cycle that hit its soft deadline.
    Timeout,
}

crate::simple_display! {
    HistoryKind {
        StateCommit => "state_commit",
        ParameterChange => "parameter_change",
        Timeout => "timeout",
    }
}

/// One entry in a want's history log.
///
/// `cycle` is the cycle the change belongs to; entries are appended in cycle
/// order and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub cycle: u64,
    pub at_ms: u64,
    pub kind: HistoryKind,
    /// Changed keys with their new values; empty for timeout entries.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changes: BTreeMap<String, Value>,
}

impl HistoryEntry {
    pub fn new(cycle: u64, at_ms: u64, kind: HistoryKind) -> Self {
        Self { cycle, at_ms, kind, changes: BTreeMap::new() }
    }

    pub fn with_changes(
        cycle: u64,
        at_ms: u64,
        kind: HistoryKind,
        changes: BTreeMap<String, Value>,
    ) -> Self {
        Self { cycle, at_ms, kind, changes }
    }
}
