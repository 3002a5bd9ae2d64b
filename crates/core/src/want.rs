// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The want entity: identity, parameters, state, status, history.
//!
//! A [`Want`] is driven by exactly one execution task. All mutable fields
//! live behind a want-local mutex; state written during a cycle is buffered
//! and committed atomically at the cycle end, so external readers never see
//! a partial cycle.

use crate::history::{HistoryEntry, HistoryKind};
use crate::label::{Labels, Selector};
use crate::owner::OwnerReference;
use crate::path::Connectivity;
use crate::status::WantStatus;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameter map, declaration order preserved.
pub type Params = IndexMap<String, Value>;

/// Identity of a want as declared in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    #[serde(default, rename = "ownerReferences", skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl WantMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            labels: Labels::new(),
            owner_references: Vec::new(),
        }
    }

    /// The single controller owner, if any.
    pub fn controller_owner(&self) -> Option<&str> {
        self.owner_references.iter().find(|r| r.controller).map(|r| r.name.as_str())
    }
}

/// Declared desired behavior of a want.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WantSpec {
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub using: Vec<Selector>,
    #[serde(default, rename = "usingGlobal", skip_serializing_if = "Vec::is_empty")]
    pub using_global: Vec<Selector>,
    #[serde(default, rename = "stateSubscriptions", skip_serializing_if = "Vec::is_empty")]
    pub state_subscriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

/// One want as declared in a config document: metadata plus spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WantManifest {
    pub metadata: WantMeta,
    #[serde(default)]
    pub spec: WantSpec,
}

impl WantManifest {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Structural validation independent of the type registry.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.metadata.name.is_empty() {
            return Err(ManifestError::MissingName);
        }
        if self.metadata.type_name.is_empty() {
            return Err(ManifestError::MissingType { name: self.metadata.name.clone() });
        }
        let controllers =
            self.metadata.owner_references.iter().filter(|r| r.controller).count();
        if controllers > 1 {
            return Err(ManifestError::MultipleControllers {
                name: self.metadata.name.clone(),
            });
        }
        Ok(())
    }
}

/// A manifest that cannot be registered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("want metadata is missing a name")]
    MissingName,
    #[error("want '{name}' is missing a type")]
    MissingType { name: String },
    #[error("want '{name}' declares more than one controller owner")]
    MultipleControllers { name: String },
}

/// Operations rejected by a want.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WantError {
    #[error("invalid status transition {from} -> {to} for want '{name}'")]
    InvalidTransition { name: String, from: WantStatus, to: WantStatus },
    #[error("cycle already open for want '{name}'")]
    CycleOpen { name: String },
    #[error("no cycle open for want '{name}'")]
    NoCycle { name: String },
    #[error("want '{name}' is terminated")]
    Terminated { name: String },
    #[error("want '{name}' is not suspended")]
    NotSuspended { name: String },
}

/// Outcome of a validated status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: WantStatus,
    pub to: WantStatus,
    /// True for Completed→Idle: the retrigger arming.
    pub retrigger: bool,
}

/// View returned by [`Want::begin_cycle`].
#[derive(Debug, Clone, PartialEq)]
pub struct CycleStart {
    /// The cycle now executing (1-based).
    pub cycle: u64,
    /// Effective parameters for this cycle.
    pub params: Params,
    /// Parameter keys that changed since the previous cycle, if any.
    pub param_change: Option<Params>,
}

/// View returned by [`Want::end_cycle`].
#[derive(Debug, Clone, PartialEq)]
pub struct CycleCommit {
    /// The cycle just committed (1-based).
    pub cycle: u64,
    /// State keys committed by this cycle.
    pub changes: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct Inner {
    spec: WantSpec,
    status: WantStatus,
    resume_status: Option<WantStatus>,
    state: BTreeMap<String, Value>,
    pending: BTreeMap<String, Value>,
    staged: BTreeMap<String, Value>,
    in_cycle: bool,
    cycle: u64,
    history: Vec<HistoryEntry>,
    /// Full replacement staged by a params-only config update.
    param_replace: Option<Params>,
    /// Single-key updates staged by UpdateParameter.
    param_updates: Params,
    exec_errors: u32,
    timeouts: u32,
}

/// The atomic unit of the runtime.
pub struct Want {
    meta: WantMeta,
    connectivity: Connectivity,
    history_cap: usize,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Want {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Want")
            .field("name", &self.meta.name)
            .field("type", &self.meta.type_name)
            .field("status", &self.status())
            .finish()
    }
}

impl Want {
    /// Init: zero state, empty history, Status=Idle.
    pub fn new(meta: WantMeta, spec: WantSpec, connectivity: Connectivity) -> Self {
        Self::with_history_cap(meta, spec, connectivity, DEFAULT_HISTORY_CAP)
    }

    pub fn with_history_cap(
        meta: WantMeta,
        spec: WantSpec,
        connectivity: Connectivity,
        history_cap: usize,
    ) -> Self {
        Self {
            meta,
            connectivity,
            history_cap: history_cap.max(1),
            inner: Mutex::new(Inner {
                spec,
                status: WantStatus::Idle,
                resume_status: None,
                state: BTreeMap::new(),
                pending: BTreeMap::new(),
                staged: BTreeMap::new(),
                in_cycle: false,
                cycle: 0,
                history: Vec::new(),
                param_replace: None,
                param_updates: Params::new(),
                exec_errors: 0,
                timeouts: 0,
            }),
        }
    }

    // --- identity -----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn type_name(&self) -> &str {
        &self.meta.type_name
    }

    pub fn labels(&self) -> &Labels {
        &self.meta.labels
    }

    pub fn meta(&self) -> &WantMeta {
        &self.meta
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn controller_owner(&self) -> Option<&str> {
        self.meta.controller_owner()
    }

    // --- spec ---------------------------------------------------------------

    pub fn spec(&self) -> WantSpec {
        self.inner.lock().spec.clone()
    }

    pub fn params(&self) -> Params {
        self.inner.lock().spec.params.clone()
    }

    // --- status -------------------------------------------------------------

    pub fn status(&self) -> WantStatus {
        self.inner.lock().status
    }

    /// Validated status transition. Same-status is a no-op. Suspension
    /// stashes the current status for [`Want::resume`]; Completed→Idle is
    /// reported as a retrigger arming.
    pub fn set_status(&self, to: WantStatus) -> Result<StatusChange, WantError> {
        let mut inner = self.inner.lock();
        let from = inner.status;
        if !from.can_transition(to) {
            return Err(WantError::InvalidTransition {
                name: self.meta.name.clone(),
                from,
                to,
            });
        }
        if from != to {
            if to == WantStatus::Suspended {
                inner.resume_status = Some(from);
            } else {
                inner.resume_status = None;
            }
            inner.status = to;
        }
        Ok(StatusChange {
            from,
            to,
            retrigger: from == WantStatus::Completed && to == WantStatus::Idle,
        })
    }

    /// Leave Suspended, restoring the stashed status (Idle if none).
    pub fn resume(&self) -> Result<StatusChange, WantError> {
        let mut inner = self.inner.lock();
        if inner.status != WantStatus::Suspended {
            return Err(WantError::NotSuspended { name: self.meta.name.clone() });
        }
        let to = inner.resume_status.take().unwrap_or(WantStatus::Idle);
        inner.status = to;
        Ok(StatusChange { from: WantStatus::Suspended, to, retrigger: false })
    }

    // --- state --------------------------------------------------------------

    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.inner.lock().state.get(key).cloned()
    }

    pub fn all_state(&self) -> BTreeMap<String, Value> {
        self.inner.lock().state.clone()
    }

    /// Store a state key. Inside a cycle the write is buffered and committed
    /// at EndCycle; outside a cycle it takes effect immediately.
    pub fn store_state(
        &self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), WantError> {
        let mut inner = self.inner.lock();
        if inner.status == WantStatus::Terminated {
            return Err(WantError::Terminated { name: self.meta.name.clone() });
        }
        let key = key.into();
        if inner.in_cycle {
            inner.pending.insert(key, value);
        } else {
            inner.state.insert(key, value);
        }
        Ok(())
    }

    /// Stage a bulk object for [`Want::commit_state_changes`].
    ///
    /// Non-object values are staged under the `"value"` key.
    pub fn stage_state_change(&self, obj: Value) -> Result<(), WantError> {
        let mut inner = self.inner.lock();
        if inner.status == WantStatus::Terminated {
            return Err(WantError::Terminated { name: self.meta.name.clone() });
        }
        match obj {
            Value::Object(map) => {
                for (k, v) in map {
                    inner.staged.insert(k, v);
                }
            }
            other => {
                inner.staged.insert("value".to_string(), other);
            }
        }
        Ok(())
    }

    /// Publish everything staged so far as one atomic commit.
    ///
    /// Inside a cycle the staged keys join the pending set (committed at
    /// EndCycle); outside a cycle they are applied immediately and logged as
    /// a single history entry.
    pub fn commit_state_changes(&self, now_ms: u64) -> Result<BTreeMap<String, Value>, WantError> {
        let mut inner = self.inner.lock();
        if inner.status == WantStatus::Terminated {
            return Err(WantError::Terminated { name: self.meta.name.clone() });
        }
        let staged = std::mem::take(&mut inner.staged);
        if staged.is_empty() {
            return Ok(staged);
        }
        if inner.in_cycle {
            for (k, v) in &staged {
                inner.pending.insert(k.clone(), v.clone());
            }
        } else {
            for (k, v) in &staged {
                inner.state.insert(k.clone(), v.clone());
            }
            let cycle = inner.cycle;
            let entry = HistoryEntry::with_changes(
                cycle,
                now_ms,
                HistoryKind::StateCommit,
                staged.clone(),
            );
            push_history(&mut inner, self.history_cap, entry);
        }
        Ok(staged)
    }

    // --- cycles -------------------------------------------------------------

    pub fn in_cycle(&self) -> bool {
        self.inner.lock().in_cycle
    }

    /// Completed cycle count; increments at EndCycle.
    pub fn cycle(&self) -> u64 {
        self.inner.lock().cycle
    }

    /// Open a cycle. Staged parameter changes become visible here — at the
    /// start of the next cycle, never mid-cycle — and are logged as one
    /// ParameterChange history entry.
    pub fn begin_cycle(&self, now_ms: u64) -> Result<CycleStart, WantError> {
        let mut inner = self.inner.lock();
        if inner.status == WantStatus::Terminated {
            return Err(WantError::Terminated { name: self.meta.name.clone() });
        }
        if inner.in_cycle {
            return Err(WantError::CycleOpen { name: self.meta.name.clone() });
        }
        let cycle = inner.cycle + 1;

        let mut changed = Params::new();
        if let Some(replace) = inner.param_replace.take() {
            for (k, v) in &replace {
                if inner.spec.params.get(k) != Some(v) {
                    changed.insert(k.clone(), v.clone());
                }
            }
            for k in inner.spec.params.keys() {
                if !replace.contains_key(k) {
                    changed.insert(k.clone(), Value::Null);
                }
            }
            inner.spec.params = replace;
        }
        let updates = std::mem::take(&mut inner.param_updates);
        for (k, v) in updates {
            if inner.spec.params.get(&k) != Some(&v) {
                changed.insert(k.clone(), v.clone());
            }
            inner.spec.params.insert(k, v);
        }

        let param_change = if changed.is_empty() {
            None
        } else {
            let entry = HistoryEntry::with_changes(
                cycle,
                now_ms,
                HistoryKind::ParameterChange,
                changed.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            );
            push_history(&mut inner, self.history_cap, entry);
            Some(changed)
        };

        inner.in_cycle = true;
        Ok(CycleStart { cycle, params: inner.spec.params.clone(), param_change })
    }

    /// Close the cycle: commit buffered state atomically, append one history
    /// entry summarising the diff, increment the cycle counter.
    pub fn end_cycle(&self, now_ms: u64) -> Result<CycleCommit, WantError> {
        let mut inner = self.inner.lock();
        if !inner.in_cycle {
            return Err(WantError::NoCycle { name: self.meta.name.clone() });
        }
        let cycle = inner.cycle + 1;
        let pending = std::mem::take(&mut inner.pending);
        let mut changes = BTreeMap::new();
        for (k, v) in pending {
            if inner.state.get(&k) != Some(&v) {
                changes.insert(k.clone(), v.clone());
            }
            inner.state.insert(k, v);
        }
        if !changes.is_empty() {
            let entry = HistoryEntry::with_changes(
                cycle,
                now_ms,
                HistoryKind::StateCommit,
                changes.clone(),
            );
            push_history(&mut inner, self.history_cap, entry);
        }
        inner.in_cycle = false;
        inner.cycle = cycle;
        Ok(CycleCommit { cycle, changes })
    }

    // --- parameters ---------------------------------------------------------

    /// Stage a single parameter update, visible at the next BeginCycle.
    pub fn update_parameter(
        &self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), WantError> {
        let mut inner = self.inner.lock();
        if inner.status == WantStatus::Terminated {
            return Err(WantError::Terminated { name: self.meta.name.clone() });
        }
        inner.param_updates.insert(key.into(), value);
        Ok(())
    }

    /// Stage a full parameter replacement (params-only config update).
    pub fn stage_params(&self, params: Params) -> Result<(), WantError> {
        let mut inner = self.inner.lock();
        if inner.status == WantStatus::Terminated {
            return Err(WantError::Terminated { name: self.meta.name.clone() });
        }
        inner.param_replace = Some(params);
        Ok(())
    }

    /// Whether a parameter change is staged but not yet visible.
    pub fn has_staged_params(&self) -> bool {
        let inner = self.inner.lock();
        inner.param_replace.is_some() || !inner.param_updates.is_empty()
    }

    // --- failure accounting -------------------------------------------------

    /// Record an exec error; returns the running count.
    pub fn record_exec_error(&self) -> u32 {
        let mut inner = self.inner.lock();
        inner.exec_errors += 1;
        inner.exec_errors
    }

    /// Record a cycle deadline hit with a synthetic history entry; returns
    /// the running count.
    pub fn record_timeout(&self, now_ms: u64) -> u32 {
        let mut inner = self.inner.lock();
        let cycle = inner.cycle + u64::from(inner.in_cycle);
        let entry = HistoryEntry::new(cycle, now_ms, HistoryKind::Timeout);
        push_history(&mut inner, self.history_cap, entry);
        inner.timeouts += 1;
        inner.timeouts
    }

    /// Clear failure counters after a clean cycle.
    pub fn reset_failures(&self) {
        let mut inner = self.inner.lock();
        inner.exec_errors = 0;
        inner.timeouts = 0;
    }

    pub fn exec_errors(&self) -> u32 {
        self.inner.lock().exec_errors
    }

    // --- history ------------------------------------------------------------

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().history.clone()
    }

    pub fn history_tail(&self, n: usize) -> Vec<HistoryEntry> {
        let inner = self.inner.lock();
        let start = inner.history.len().saturating_sub(n);
        inner.history[start..].to_vec()
    }

    // --- recovery -----------------------------------------------------------

    /// Restore runtime fields from a snapshot. Used only at startup, before
    /// the want is handed to a driver.
    pub fn restore(
        &self,
        status: WantStatus,
        state: BTreeMap<String, Value>,
        cycle: u64,
        history: Vec<HistoryEntry>,
    ) {
        let mut inner = self.inner.lock();
        inner.status = status;
        inner.state = state;
        inner.cycle = cycle;
        inner.history = history;
        inner.resume_status = None;
        inner.in_cycle = false;
    }
}

/// Default in-process history bound per want.
pub const DEFAULT_HISTORY_CAP: usize = 256;

fn push_history(inner: &mut Inner, cap: usize, entry: HistoryEntry) {
    inner.history.push(entry);
    if inner.history.len() > cap {
        let excess = inner.history.len() - cap;
        inner.history.drain(..excess);
    }
}

/// Test builder for wants and manifests.
#[cfg(any(test, feature = "test-support"))]
pub struct WantBuilder {
    name: String,
    type_name: String,
    labels: Labels,
    owner_references: Vec<OwnerReference>,
    params: Params,
    using: Vec<Selector>,
    using_global: Vec<Selector>,
    state_subscriptions: Vec<String>,
    connectivity: Connectivity,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for WantBuilder {
    fn default() -> Self {
        Self {
            name: "test-want".to_string(),
            type_name: "passthrough".to_string(),
            labels: Labels::new(),
            owner_references: Vec::new(),
            params: Params::new(),
            using: Vec::new(),
            using_global: Vec::new(),
            state_subscriptions: Vec::new(),
            connectivity: Connectivity::default(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl WantBuilder {
    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = v.into();
        self
    }

    pub fn type_name(mut self, v: impl Into<String>) -> Self {
        self.type_name = v.into();
        self
    }

    pub fn label(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.labels.insert(k.into(), v.into());
        self
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner_references.push(OwnerReference::controller(owner));
        self
    }

    pub fn param(mut self, k: impl Into<String>, v: impl Into<Value>) -> Self {
        self.params.insert(k.into(), v.into());
        self
    }

    pub fn using(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.using.push(Selector::from_pairs([(k.into(), v.into())]));
        self
    }

    pub fn using_global(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.using_global.push(Selector::from_pairs([(k.into(), v.into())]));
        self
    }

    pub fn subscribes_to(mut self, source: impl Into<String>) -> Self {
        self.state_subscriptions.push(source.into());
        self
    }

    pub fn connectivity(mut self, c: Connectivity) -> Self {
        self.connectivity = c;
        self
    }

    pub fn manifest(self) -> WantManifest {
        WantManifest {
            metadata: WantMeta {
                name: self.name,
                type_name: self.type_name,
                labels: self.labels,
                owner_references: self.owner_references,
            },
            spec: WantSpec {
                params: self.params,
                using: self.using,
                using_global: self.using_global,
                state_subscriptions: self.state_subscriptions,
                requires: Vec::new(),
            },
        }
    }

    pub fn build(self) -> Want {
        let connectivity = self.connectivity;
        let manifest = self.manifest();
        Want::new(manifest.metadata, manifest.spec, connectivity)
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Want {
    /// Create a builder with test defaults.
    pub fn builder() -> WantBuilder {
        WantBuilder::default()
    }
}

#[cfg(test)]
#[path = "want_tests.rs"]
mod tests;
