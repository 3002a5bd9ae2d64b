// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime object: the single explicit handle to a running engine.
//!
//! There is no process-global state; everything hangs off [`Runtime`],
//! which owns the shared maps, the reconciler task, and the per-want
//! drivers.

use crate::config::RuntimeConfig;
use crate::driver::{DriverHandle, DriverTuning, RuntimeOps};
use crate::error::EngineError;
use crate::graph::{Channel, Paths, Topology};
use crate::reconciler::{self, Reconciler};
use crate::registry::WantTypeRegistry;
use crate::retrigger::RetriggerBus;
use crate::subs::{SubscriberId, SubscriptionHandle, SubscriptionHub};
use indexmap::IndexMap;
use mw_core::{
    edge_name, Clock, HistoryEntry, Notification, ParameterChange, StatusChange, SystemClock,
    Want, WantManifest, WantStatus,
};
use mw_storage::{Snapshot, SnapshotStore, WantSnapshot};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long shutdown waits for each driver task after cancellation.
const DRIVER_EXIT_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Live wants and their driver handles. Written only by the reconciler and
/// control-plane calls; drivers read through short-lived locks.
#[derive(Default)]
pub(crate) struct Index {
    pub wants: HashMap<String, Arc<Want>>,
    pub drivers: HashMap<String, DriverHandle>,
}

/// The declared configuration as last submitted.
#[derive(Default)]
pub(crate) struct Desired {
    pub wants: IndexMap<String, WantManifest>,
    pub revision: u64,
}

/// The configuration the reconciler last applied, with its hash.
#[derive(Default)]
pub(crate) struct Applied {
    pub wants: IndexMap<String, WantManifest>,
    pub hash: Option<[u8; 32]>,
}

pub(crate) struct Shared<C: Clock> {
    pub cfg: RuntimeConfig,
    pub clock: C,
    pub registry: WantTypeRegistry,
    pub topology: Mutex<Topology>,
    pub index: Mutex<Index>,
    pub desired: Mutex<Desired>,
    pub applied: Mutex<Applied>,
    pub bus: RetriggerBus,
    pub hub: SubscriptionHub,
    pub cancel: CancellationToken,
    pub reconcile: Notify,
    pub dirty: AtomicBool,
    pub snapshots: Option<SnapshotStore>,
}

impl<C: Clock> Shared<C> {
    pub(crate) fn build_snapshot(&self) -> Snapshot {
        let index = self.index.lock();
        let mut names: Vec<&String> = index.wants.keys().collect();
        names.sort();
        let wants = names
            .into_iter()
            .filter_map(|name| index.wants.get(name))
            .map(|want| WantSnapshot {
                metadata: want.meta().clone(),
                spec: want.spec(),
                status: want.status(),
                state: want.all_state(),
                history_tail: want.history_tail(self.cfg.snapshot_history),
                cycle: want.cycle(),
            })
            .collect();
        Snapshot::new(self.clock.epoch_ms(), wants)
    }
}

impl<C: Clock + 'static> RuntimeOps for Shared<C> {
    fn epoch_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    fn want_status(&self, name: &str) -> Option<WantStatus> {
        self.index.lock().wants.get(name).map(|w| w.status())
    }

    fn children_of(&self, owner: &str) -> Vec<(String, WantStatus)> {
        let index = self.index.lock();
        let mut children: Vec<(String, WantStatus)> = index
            .wants
            .values()
            .filter(|w| w.controller_owner() == Some(owner))
            .map(|w| (w.name().to_string(), w.status()))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children
    }

    fn submit_manifests(&self, manifests: Vec<WantManifest>) -> Result<(), String> {
        let mut changed = false;
        {
            let mut desired = self.desired.lock();
            for manifest in manifests {
                manifest.validate().map_err(|e| e.to_string())?;
                let name = manifest.name().to_string();
                if desired.wants.get(&name) != Some(&manifest) {
                    desired.wants.insert(name, manifest);
                    changed = true;
                }
            }
            if changed {
                desired.revision += 1;
            }
        }
        if changed {
            self.reconcile.notify_one();
        }
        Ok(())
    }

    fn note_send(&self, consumer: &str) {
        if self.want_status(consumer) == Some(WantStatus::Completed) {
            if self.bus.record(consumer) {
                debug!(consumer, "retrigger intent recorded");
            }
            self.reconcile.notify_one();
        }
    }

    fn paths_of(&self, want: &str) -> Paths {
        self.topology.lock().paths_for(want)
    }

    fn deliver(&self, target: &str, notification: Notification) {
        self.hub.deliver(target, notification);
    }

    fn broadcast(&self, notification: &Notification) {
        self.hub.broadcast(notification);
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    fn request_reconcile(&self) {
        self.reconcile.notify_one();
    }

    fn driver_tuning(&self) -> DriverTuning {
        DriverTuning {
            cycle_deadline: self.cfg.cycle_deadline,
            error_threshold: self.cfg.error_threshold,
            timeout_threshold: self.cfg.timeout_threshold,
            idle_pause: self.cfg.idle_pause,
        }
    }
}

/// A reconciling dataflow runtime.
pub struct Runtime<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

impl Runtime<SystemClock> {
    pub fn new(cfg: RuntimeConfig) -> Self {
        Self::with_clock(cfg, SystemClock)
    }
}

impl Default for Runtime<SystemClock> {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl<C: Clock + 'static> Runtime<C> {
    pub fn with_clock(cfg: RuntimeConfig, clock: C) -> Self {
        let snapshots = cfg.snapshot_path.clone().map(SnapshotStore::new);
        let hub = SubscriptionHub::new(cfg.inbox_capacity);
        let shared = Arc::new(Shared {
            cfg,
            clock,
            registry: WantTypeRegistry::with_builtins(),
            topology: Mutex::default(),
            index: Mutex::default(),
            desired: Mutex::default(),
            applied: Mutex::default(),
            bus: RetriggerBus::default(),
            hub,
            cancel: CancellationToken::new(),
            reconcile: Notify::new(),
            dirty: AtomicBool::new(false),
            snapshots,
        });
        Self { shared, reconciler: Mutex::new(None) }
    }

    /// The type registry (built-ins pre-registered).
    pub fn registry(&self) -> &WantTypeRegistry {
        &self.shared.registry
    }

    /// Spawn the reconciler task. Idempotent.
    pub fn start(&self) {
        let mut slot = self.reconciler.lock();
        if slot.is_some() {
            return;
        }
        let reconciler = Reconciler::new(Arc::clone(&self.shared));
        *slot = Some(tokio::spawn(reconciler.run()));
        info!("runtime started");
    }

    /// Graceful shutdown: stop the reconciler, cancel every driver and wait
    /// for it to exit, flush a final snapshot.
    pub async fn shutdown(&self) {
        self.shared.cancel.cancel();
        let task = self.reconciler.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        let handles: Vec<DriverHandle> = {
            let mut index = self.shared.index.lock();
            index.drivers.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            if tokio::time::timeout(DRIVER_EXIT_GRACE, handle.join).await.is_err() {
                warn!("driver did not exit within the grace period");
            }
        }
        if let Some(store) = &self.shared.snapshots {
            store.write_logged(&self.shared.build_snapshot());
        }
        info!("runtime stopped");
    }

    // --- declared config ----------------------------------------------------

    /// Replace the declared configuration.
    ///
    /// Dynamically composed children (owner expansions) are not part of the
    /// declared document; they survive the replacement as long as their
    /// controller owner does, and cascade away with it otherwise.
    pub fn apply(&self, wants: Vec<WantManifest>) -> Result<(), EngineError> {
        let mut map = IndexMap::with_capacity(wants.len());
        for manifest in wants {
            manifest.validate()?;
            let name = manifest.name().to_string();
            if map.insert(name.clone(), manifest).is_some() {
                return Err(EngineError::DuplicateWant(name));
            }
        }
        {
            let mut desired = self.shared.desired.lock();
            loop {
                let carried: Vec<WantManifest> = desired
                    .wants
                    .values()
                    .filter(|m| !map.contains_key(m.name()))
                    .filter(|m| {
                        m.metadata
                            .controller_owner()
                            .is_some_and(|owner| map.contains_key(owner))
                    })
                    .cloned()
                    .collect();
                if carried.is_empty() {
                    break;
                }
                for manifest in carried {
                    map.insert(manifest.name().to_string(), manifest);
                }
            }
            desired.wants = map;
            desired.revision += 1;
        }
        self.shared.reconcile.notify_one();
        Ok(())
    }

    /// Add or update a single want declaration.
    pub fn add_want(&self, manifest: WantManifest) -> Result<(), EngineError> {
        manifest.validate()?;
        {
            let mut desired = self.shared.desired.lock();
            desired.wants.insert(manifest.name().to_string(), manifest);
            desired.revision += 1;
        }
        self.shared.reconcile.notify_one();
        Ok(())
    }

    /// Remove a want declaration. Controller children cascade unless one of
    /// them blocks owner deletion, in which case the delete is refused.
    pub fn delete_want(&self, name: &str) -> Result<(), EngineError> {
        {
            let mut desired = self.shared.desired.lock();
            if !desired.wants.contains_key(name) {
                return Err(EngineError::WantNotFound(name.to_string()));
            }
            let blocking = desired.wants.values().find(|m| {
                m.metadata
                    .owner_references
                    .iter()
                    .any(|r| r.controller && r.name == name && r.block_owner_deletion)
            });
            if let Some(child) = blocking {
                return Err(EngineError::DeletionBlocked {
                    owner: name.to_string(),
                    child: child.name().to_string(),
                });
            }
            desired.wants.shift_remove(name);
            desired.revision += 1;
        }
        self.shared.reconcile.notify_one();
        Ok(())
    }

    // --- control plane ------------------------------------------------------

    /// Pause a want at its next cycle boundary.
    pub fn suspend(&self, name: &str) -> Result<(), EngineError> {
        let want = self.want(name)?;
        want.set_status(WantStatus::Suspended)?;
        self.shared.bus.cancel(name);
        self.shared.mark_dirty();
        debug!(want = name, "suspended");
        Ok(())
    }

    /// Leave Suspended, restoring the stashed status.
    pub fn resume(&self, name: &str) -> Result<StatusChange, EngineError> {
        let want = self.want(name)?;
        let change = want.resume()?;
        if change.to.is_active() {
            if let Some(handle) = self.shared.index.lock().drivers.get(name) {
                handle.wake.notify_one();
            }
        }
        self.shared.mark_dirty();
        self.shared.reconcile.notify_one();
        debug!(want = name, status = %change.to, "resumed");
        Ok(change)
    }

    /// Kill a want now: cancel its driver, mark Terminated, remove it from
    /// the runtime index and the declared config.
    pub fn terminate(&self, name: &str) -> Result<(), EngineError> {
        let want = self.want(name)?;
        {
            let mut index = self.shared.index.lock();
            if let Some(handle) = index.drivers.remove(name) {
                handle.cancel.cancel();
            }
            index.wants.remove(name);
        }
        let _ = want.set_status(WantStatus::Terminated);
        self.shared.hub.remove_want(name);
        self.shared.bus.cancel(name);
        {
            let mut desired = self.shared.desired.lock();
            if desired.wants.shift_remove(name).is_some() {
                desired.revision += 1;
            }
        }
        self.shared.mark_dirty();
        self.shared.reconcile.notify_one();
        info!(want = name, "terminated");
        Ok(())
    }

    /// Validated status transition from the control plane. Completed→Idle
    /// arms a retrigger.
    pub fn set_status(&self, name: &str, status: WantStatus) -> Result<StatusChange, EngineError> {
        let want = self.want(name)?;
        let change = want.set_status(status)?;
        if change.retrigger {
            self.shared.bus.record(name);
        }
        if change.to.is_active() {
            if let Some(handle) = self.shared.index.lock().drivers.get(name) {
                handle.wake.notify_one();
            }
        }
        self.shared.mark_dirty();
        self.shared.reconcile.notify_one();
        Ok(change)
    }

    /// Direct state write, only legal between cycles (external mutation).
    pub fn store_state(&self, name: &str, key: &str, value: Value) -> Result<(), EngineError> {
        let want = self.want(name)?;
        want.store_state(key, value)?;
        self.shared.mark_dirty();
        Ok(())
    }

    /// Between-cycle parameter edit; fans out to controller children, which
    /// observe the new value at the start of their next cycle.
    pub fn update_parameter(
        &self,
        name: &str,
        key: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        let want = self.want(name)?;
        want.update_parameter(key, value.clone())?;
        let children = self.shared.children_of(name);
        for (child, _) in children {
            if let Some(child_want) = self.shared.index.lock().wants.get(&child).cloned() {
                let _ = child_want.update_parameter(key, value.clone());
            }
            let mut changes = IndexMap::new();
            changes.insert(key.to_string(), value.clone());
            self.shared.hub.deliver(
                &child,
                Notification::Parameter(ParameterChange {
                    source: name.to_string(),
                    changes,
                }),
            );
        }
        self.shared.mark_dirty();
        Ok(())
    }

    // --- queries ------------------------------------------------------------

    pub fn contains(&self, name: &str) -> bool {
        self.shared.index.lock().wants.contains_key(name)
    }

    pub fn status(&self, name: &str) -> Option<WantStatus> {
        self.shared.want_status(name)
    }

    /// All live wants with their statuses, name-sorted.
    pub fn statuses(&self) -> BTreeMap<String, WantStatus> {
        self.shared
            .index
            .lock()
            .wants
            .values()
            .map(|w| (w.name().to_string(), w.status()))
            .collect()
    }

    pub fn state(&self, name: &str) -> Option<BTreeMap<String, Value>> {
        self.shared.index.lock().wants.get(name).map(|w| w.all_state())
    }

    pub fn state_value(&self, name: &str, key: &str) -> Option<Value> {
        self.shared.index.lock().wants.get(name).and_then(|w| w.get_state(key))
    }

    pub fn history(&self, name: &str) -> Option<Vec<HistoryEntry>> {
        self.shared.index.lock().wants.get(name).map(|w| w.history())
    }

    /// Monotonic cycle counter for a want.
    pub fn cycle_of(&self, name: &str) -> Option<u64> {
        self.shared.index.lock().wants.get(name).map(|w| w.cycle())
    }

    pub fn want_names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.shared.index.lock().wants.keys().cloned().collect();
        names.sort();
        names
    }

    /// The channel behind a local edge, if currently allocated. Edge
    /// identity across reconciliations is observable through
    /// [`Channel::same_channel`].
    pub fn edge_channel(&self, producer: &str, consumer: &str) -> Option<Channel> {
        self.shared
            .topology
            .lock()
            .channel(&edge_name(producer, consumer, false))
            .cloned()
    }

    // --- observation --------------------------------------------------------

    /// Watch every notification the runtime publishes.
    pub fn watch(&self) -> SubscriptionHandle {
        self.shared.hub.watch()
    }

    pub fn unwatch(&self, id: SubscriberId) -> bool {
        self.shared.hub.unwatch(id)
    }

    /// Make the next reconciler tick process immediately.
    pub fn reconcile_now(&self) {
        self.shared.reconcile.notify_one();
    }

    /// Point-in-time snapshot of all wants.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.build_snapshot()
    }

    /// Seed the runtime from a previous snapshot. Must run before
    /// [`Runtime::start`]; restores each want's status/state/history and
    /// primes the last-applied config so an unchanged declared config does
    /// not restart completed wants.
    pub fn recover(&self, snapshot: &Snapshot) -> Result<(), EngineError> {
        let manifests: IndexMap<String, WantManifest> = snapshot
            .wants
            .iter()
            .map(|ws| (ws.metadata.name.clone(), ws.manifest()))
            .collect();

        for ws in &snapshot.wants {
            if !reconciler::create_want(&self.shared, &ws.manifest()) {
                continue;
            }
            if let Some(want) = self.shared.index.lock().wants.get(&ws.metadata.name) {
                want.restore(
                    ws.status,
                    ws.state.clone(),
                    ws.cycle,
                    ws.history_tail.clone(),
                );
            }
        }
        reconciler::rebuild_topology(&self.shared);
        // Wants that were mid-flight when the snapshot was taken resume
        // their drivers right away.
        {
            let index = self.shared.index.lock();
            for (name, want) in &index.wants {
                if want.status().is_active() {
                    if let Some(handle) = index.drivers.get(name) {
                        handle.wake.notify_one();
                    }
                }
            }
        }

        let hash = reconciler::config_hash(&manifests);
        {
            let mut desired = self.shared.desired.lock();
            desired.wants = manifests.clone();
            desired.revision += 1;
        }
        {
            let mut applied = self.shared.applied.lock();
            applied.wants = manifests;
            applied.hash = hash;
        }
        info!(wants = snapshot.wants.len(), "recovered from snapshot");
        Ok(())
    }

    /// Run one reconciliation pass inline (deterministic tests and the CLI
    /// dry paths; the ticking reconciler is the production driver).
    pub async fn reconcile_once(&self) {
        Reconciler::new(Arc::clone(&self.shared)).pass().await;
    }

    fn want(&self, name: &str) -> Result<Arc<Want>, EngineError> {
        self.shared
            .index
            .lock()
            .wants
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::WantNotFound(name.to_string()))
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
