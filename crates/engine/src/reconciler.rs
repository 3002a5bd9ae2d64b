// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The reconciliation loop.
//!
//! A single cooperative task. Two things fire a pass: the fixed-period
//! ticker and an explicit trigger (which just makes the next tick process
//! immediately — there is no trigger queue). A pass diffs declared against
//! applied config, applies structural changes in dependency order, rebuilds
//! the channel graph, re-arms retriggered wants, starts ready wants, and
//! persists a snapshot. A single bad want fails that want, never the pass.

use crate::driver::{Driver, RuntimeOps};
use crate::resolver::{dependency_levels, resolve_edges, EdgeSpec, WantView};
use crate::runtime::Shared;
use indexmap::IndexMap;
use mw_core::{
    short, validate_owner_dag, Clock, ConnectivityIssue, Notification, ParameterChange, Want,
    WantManifest, WantStatus,
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub(crate) struct Reconciler<C: Clock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock + 'static> Reconciler<C> {
    pub(crate) fn new(shared: Arc<Shared<C>>) -> Self {
        Self { shared }
    }

    pub(crate) async fn run(self) {
        let tick = self.shared.cfg.tick;
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        debug!(tick_ms = tick.as_millis() as u64, "reconciler running");
        loop {
            tokio::select! {
                _ = self.shared.cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.shared.reconcile.notified() => {}
            }
            let started = std::time::Instant::now();
            self.pass().await;
            let elapsed = started.elapsed();
            if elapsed > tick {
                warn!(elapsed_ms = elapsed.as_millis() as u64, "slow reconcile pass");
            }
        }
        debug!("reconciler stopped");
    }

    /// One reconciliation pass.
    pub(crate) async fn pass(&self) {
        let desired = self.shared.desired.lock().wants.clone();
        let hash = config_hash(&desired);
        let changed = hash.is_none() || self.shared.applied.lock().hash != hash;

        if changed {
            self.sync_structure(desired);
            // Cascade handling may have amended the declared set; the
            // applied config records what actually stands.
            let now_desired = self.shared.desired.lock().wants.clone();
            let now_hash = config_hash(&now_desired);
            {
                let mut applied = self.shared.applied.lock();
                applied.wants = now_desired;
                applied.hash = now_hash;
            }
            if let Some(hash) = now_hash {
                let hex = hash_hex(&hash);
                debug!(config_hash = short(&hex, 12), "config applied");
            }
            self.shared.mark_dirty();
        }

        self.rearm_completed();
        self.start_ready();
        self.persist(changed);
    }

    /// Apply the declared-vs-applied diff in dependency order.
    fn sync_structure(&self, mut desired: IndexMap<String, WantManifest>) {
        let applied = self.shared.applied.lock().wants.clone();

        // Deletion set with owner cascade / refusal.
        let mut deleted: HashSet<String> =
            applied.keys().filter(|n| !desired.contains_key(*n)).cloned().collect();
        cascade_deletes(&applied, &mut desired, &mut deleted);
        {
            // Cascade may have removed children from (or restored owners
            // to) the declared set.
            let mut shared_desired = self.shared.desired.lock();
            if shared_desired.wants != desired {
                shared_desired.wants = desired.clone();
                shared_desired.revision += 1;
            }
        }

        // Owner references must form a DAG; offenders fail, the rest apply.
        let mut config_failed: Vec<(WantManifest, String)> = Vec::new();
        loop {
            let refs: Vec<(&str, Vec<&str>)> = desired
                .values()
                .map(|m| {
                    (
                        m.name(),
                        m.metadata.owner_references.iter().map(|r| r.name.as_str()).collect(),
                    )
                })
                .collect();
            match validate_owner_dag(refs) {
                Ok(()) => break,
                Err(cycle) => {
                    let name = cycle.through.clone();
                    if let Some(manifest) = desired.shift_remove(&name) {
                        config_failed.push((manifest, cycle.to_string()));
                    } else {
                        break;
                    }
                }
            }
        }

        // Diff against the applied config.
        let mut adds: Vec<String> = Vec::new();
        let mut param_swaps: Vec<(String, WantManifest)> = Vec::new();
        for (name, manifest) in &desired {
            match applied.get(name) {
                None => adds.push(name.clone()),
                Some(old) if old == manifest => {}
                Some(old) => {
                    if params_only_change(old, manifest) {
                        param_swaps.push((name.clone(), manifest.clone()));
                    } else {
                        // Structural update: delete + re-add at this level.
                        deleted.insert(name.clone());
                        adds.push(name.clone());
                    }
                }
            }
        }

        let levels = levels_for(&desired);

        // Deletes: sinks before sources.
        let mut delete_order: Vec<String> = deleted.iter().cloned().collect();
        delete_order.sort_by_key(|n| (std::cmp::Reverse(levels.get(n).copied().unwrap_or(0)), n.clone()));
        for name in &delete_order {
            self.teardown(name);
        }

        // Params-only updates keep the want; the new params swap in between
        // cycles and controller children hear about the changed keys.
        for (name, manifest) in param_swaps {
            self.swap_params(&name, &manifest);
        }

        // Adds: sources before sinks.
        adds.sort_by_key(|n| (levels.get(n).copied().unwrap_or(0), n.clone()));
        for name in &adds {
            if let Some(manifest) = desired.get(name) {
                create_want(&self.shared, manifest);
            }
        }

        // Wants knocked out by config validation still exist, as Failed.
        for (manifest, msg) in config_failed {
            fail_stub(&self.shared, &manifest, &msg);
        }

        rebuild_topology(&self.shared);

        if !delete_order.is_empty() || !adds.is_empty() {
            info!(
                added = adds.len(),
                deleted = delete_order.len(),
                "applied config diff"
            );
        }
    }

    fn teardown(&self, name: &str) {
        let mut index = self.shared.index.lock();
        if let Some(handle) = index.drivers.remove(name) {
            handle.cancel.cancel();
        }
        if let Some(want) = index.wants.remove(name) {
            let _ = want.set_status(WantStatus::Terminated);
        }
        drop(index);
        self.shared.hub.remove_want(name);
        self.shared.bus.cancel(name);
        debug!(want = name, "torn down");
    }

    fn swap_params(&self, name: &str, manifest: &WantManifest) {
        let index = self.shared.index.lock();
        let Some(want) = index.wants.get(name).cloned() else { return };
        drop(index);

        let old = want.params();
        let new = manifest.spec.params.clone();
        let mut changes = IndexMap::new();
        for (k, v) in &new {
            if old.get(k) != Some(v) {
                changes.insert(k.clone(), v.clone());
            }
        }
        for k in old.keys() {
            if !new.contains_key(k) {
                changes.insert(k.clone(), Value::Null);
            }
        }
        if want.stage_params(new).is_err() {
            return;
        }
        debug!(want = name, changed = changes.len(), "staged parameter swap");

        // Controller children observe the same change at their next cycle.
        for (child, _) in self.shared.children_of(name) {
            let child_want = self.shared.index.lock().wants.get(&child).cloned();
            if let Some(child_want) = child_want {
                for (k, v) in &changes {
                    let _ = child_want.update_parameter(k.clone(), v.clone());
                }
            }
            self.shared.hub.deliver(
                &child,
                Notification::Parameter(ParameterChange {
                    source: name.to_string(),
                    changes: changes.clone(),
                }),
            );
        }
    }

    /// Completed wants with pending upstream data (or an explicit intent)
    /// go back to Idle; start_ready picks them up in the same pass.
    fn rearm_completed(&self) {
        let intents: HashSet<String> = self.shared.bus.drain().into_iter().collect();
        let candidates: Vec<Arc<Want>> = {
            let index = self.shared.index.lock();
            index
                .wants
                .values()
                .filter(|w| w.status() == WantStatus::Completed)
                .cloned()
                .collect()
        };
        for want in candidates {
            let has_intent = intents.contains(want.name());
            let has_input = {
                let topology = self.shared.topology.lock();
                topology
                    .paths_for(want.name())
                    .ins
                    .iter()
                    .any(|p| p.channel.has_pending())
            };
            if !has_intent && !has_input {
                continue;
            }
            match want.set_status(WantStatus::Idle) {
                Ok(_) => {
                    info!(want = %want.name(), "retriggered");
                    self.shared.mark_dirty();
                }
                Err(e) => debug!(want = %want.name(), error = %e, "re-arm skipped"),
            }
        }
    }

    /// Start every Idle want whose required connectivity is satisfied, in
    /// dependency order (producers before consumers).
    fn start_ready(&self) {
        let ready: Vec<(String, Arc<Want>)> = {
            let index = self.shared.index.lock();
            let topology = self.shared.topology.lock();
            index
                .wants
                .values()
                .filter(|w| w.status() == WantStatus::Idle)
                .filter(|w| index.drivers.contains_key(w.name()))
                .filter(|w| {
                    let paths = topology.paths_for(w.name());
                    w.connectivity().satisfied(paths.in_count(), paths.out_count())
                })
                .map(|w| (w.name().to_string(), Arc::clone(w)))
                .collect()
        };
        if ready.is_empty() {
            return;
        }

        let desired = self.shared.desired.lock().wants.clone();
        let levels = levels_for(&desired);
        let mut ordered = ready;
        ordered.sort_by_key(|(name, _)| (levels.get(name).copied().unwrap_or(0), name.clone()));

        for (name, want) in ordered {
            match want.set_status(WantStatus::Running) {
                Ok(_) => {
                    if let Some(handle) = self.shared.index.lock().drivers.get(&name) {
                        handle.wake.notify_one();
                    }
                    debug!(want = %name, "started");
                    self.shared.mark_dirty();
                }
                Err(e) => warn!(want = %name, error = %e, "start rejected"),
            }
        }
    }

    fn persist(&self, structural: bool) {
        let Some(store) = &self.shared.snapshots else { return };
        let dirty = self.shared.dirty.swap(false, Ordering::Relaxed);
        if !structural && !dirty {
            return;
        }
        store.write_logged(&self.shared.build_snapshot());
    }
}

/// SHA-256 over the canonical JSON of the declared config. `None` forces a
/// structural pass (encoding failures never wedge the loop).
pub(crate) fn config_hash(wants: &IndexMap<String, WantManifest>) -> Option<[u8; 32]> {
    let canonical = serde_json::to_vec(wants).ok()?;
    Some(Sha256::digest(&canonical).into())
}

fn hash_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

/// True when only `spec.params` differs between two manifests.
fn params_only_change(old: &WantManifest, new: &WantManifest) -> bool {
    if old.metadata != new.metadata {
        return false;
    }
    let mut o = old.spec.clone();
    let mut n = new.spec.clone();
    o.params = Default::default();
    n.params = Default::default();
    o == n && old.spec.params != new.spec.params
}

/// Extend `deleted` with controller children of deleted owners; restore
/// owners whose deletion a child blocks.
fn cascade_deletes(
    applied: &IndexMap<String, WantManifest>,
    desired: &mut IndexMap<String, WantManifest>,
    deleted: &mut HashSet<String>,
) {
    loop {
        // Children with block_owner_deletion veto their owner's removal.
        let mut restored = false;
        let blocking: Vec<String> = desired
            .values()
            .filter_map(|m| {
                m.metadata
                    .owner_references
                    .iter()
                    .find(|r| r.controller && r.block_owner_deletion && deleted.contains(&r.name))
                    .map(|r| r.name.clone())
            })
            .collect();
        for owner in blocking {
            if let Some(manifest) = applied.get(&owner) {
                warn!(owner = %owner, "owner deletion blocked by child");
                desired.insert(owner.clone(), manifest.clone());
                deleted.remove(&owner);
                restored = true;
            } else {
                deleted.remove(&owner);
            }
        }

        // Remaining children of deleted owners cascade.
        let mut cascaded = false;
        let names: Vec<String> = desired.keys().cloned().collect();
        for name in names {
            let Some(manifest) = desired.get(&name) else { continue };
            let owner_deleted = manifest
                .metadata
                .owner_references
                .iter()
                .any(|r| r.controller && deleted.contains(&r.name));
            if owner_deleted {
                desired.shift_remove(&name);
                deleted.insert(name);
                cascaded = true;
            }
        }

        if !restored && !cascaded {
            break;
        }
    }
}

fn levels_for(desired: &IndexMap<String, WantManifest>) -> HashMap<String, u32> {
    let views: Vec<WantView> = desired
        .values()
        .map(|m| WantView {
            name: m.name(),
            labels: &m.metadata.labels,
            owner: m.metadata.controller_owner(),
            using: &m.spec.using,
            using_global: &m.spec.using_global,
        })
        .collect();
    let edges = resolve_edges(&views);
    dependency_levels(desired.keys().cloned(), &edges)
}

/// Instantiate a want from its manifest: resolve the type, validate params,
/// spawn the driver. Config errors produce a Failed stub instead of
/// aborting the pass. Returns true when a driver was spawned.
pub(crate) fn create_want<C: Clock + 'static>(
    shared: &Arc<Shared<C>>,
    manifest: &WantManifest,
) -> bool {
    let name = manifest.name().to_string();
    let Some(registered) = shared.registry.resolve(&manifest.metadata.type_name) else {
        fail_stub(
            shared,
            manifest,
            &format!("unknown want type '{}'", manifest.metadata.type_name),
        );
        return false;
    };

    let params = match mw_config::validate_params(&registered.definition, &manifest.spec.params)
    {
        Ok(params) => params,
        Err(e) => {
            fail_stub(shared, manifest, &format!("invalid parameters: {}", e));
            return false;
        }
    };

    let mut spec = manifest.spec.clone();
    spec.params = params;
    let want = Arc::new(Want::with_history_cap(
        manifest.metadata.clone(),
        spec,
        registered.definition.connectivity,
        shared.cfg.history_cap,
    ));

    let run = match registered.instantiate(&want) {
        Ok(run) => run,
        Err(e) => {
            fail_stub(shared, manifest, &e.to_string());
            return false;
        }
    };

    let inbox = shared.hub.register_want(&name);
    let ops: Arc<dyn RuntimeOps> = Arc::clone(shared) as Arc<dyn RuntimeOps>;
    let handle = Driver::spawn(Arc::clone(&want), run, inbox, ops, &shared.cancel);
    let mut index = shared.index.lock();
    index.wants.insert(name.clone(), want);
    index.drivers.insert(name.clone(), handle);
    debug!(want = %name, type_name = %manifest.metadata.type_name, "created");
    true
}

/// Create (or replace) a want that exists only to carry a Failed status and
/// its error message.
fn fail_stub<C: Clock + 'static>(shared: &Arc<Shared<C>>, manifest: &WantManifest, msg: &str) {
    let want = Arc::new(Want::with_history_cap(
        manifest.metadata.clone(),
        manifest.spec.clone(),
        Default::default(),
        shared.cfg.history_cap,
    ));
    let _ = want.set_status(WantStatus::Failed);
    let _ = want.store_state("error", Value::String(msg.to_string()));
    error!(want = %manifest.name(), error = msg, "want failed at reconciliation");
    {
        let mut index = shared.index.lock();
        if let Some(handle) = index.drivers.remove(manifest.name()) {
            handle.cancel.cancel();
        }
        index.wants.insert(manifest.name().to_string(), want);
    }
    shared.hub.remove_want(manifest.name());
}

/// Re-resolve edges from the live want set and rebuild the channel graph,
/// then enforce connectivity maximums.
pub(crate) fn rebuild_topology<C: Clock + 'static>(shared: &Arc<Shared<C>>) {
    // Failed and terminated wants hold no edges.
    let live: Vec<(String, mw_core::WantMeta, mw_core::WantSpec)> = {
        let index = shared.index.lock();
        index
            .wants
            .values()
            .filter(|w| !matches!(w.status(), WantStatus::Failed | WantStatus::Terminated))
            .map(|w| (w.name().to_string(), w.meta().clone(), w.spec()))
            .collect()
    };
    let views: Vec<WantView> = live
        .iter()
        .map(|(name, meta, spec)| WantView {
            name,
            labels: &meta.labels,
            owner: meta.controller_owner(),
            using: &spec.using,
            using_global: &spec.using_global,
        })
        .collect();
    let edges: Vec<EdgeSpec> = resolve_edges(&views);

    let stats = {
        let mut topology = shared.topology.lock();
        topology.rebuild(&edges, shared.cfg.channel_capacity)
    };
    debug!(
        allocated = stats.allocated,
        reused = stats.reused,
        dropped = stats.dropped,
        "topology rebuilt"
    );

    // Enforce maximums; unmet minimums just leave the want waiting in Idle.
    let checks: Vec<(Arc<Want>, usize, usize)> = {
        let index = shared.index.lock();
        let topology = shared.topology.lock();
        index
            .wants
            .values()
            .filter(|w| !matches!(w.status(), WantStatus::Failed | WantStatus::Terminated))
            .map(|w| {
                let paths = topology.paths_for(w.name());
                (Arc::clone(w), paths.in_count(), paths.out_count())
            })
            .collect()
    };
    for (want, ins, outs) in checks {
        if let Err(issue) = want.connectivity().check(ins, outs) {
            let over_max = matches!(
                issue,
                ConnectivityIssue::TooManyInputs { .. } | ConnectivityIssue::TooManyOutputs { .. }
            );
            if over_max {
                let _ = want.set_status(WantStatus::Failed);
                let _ = want
                    .store_state("error", Value::String(format!("connectivity violation: {}", issue)));
                error!(want = %want.name(), error = %issue, "connectivity violation");
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
