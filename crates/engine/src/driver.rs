// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-want execution driver.
//!
//! Every want runs in its own long-lived task. The driver parks until the
//! reconciler starts the want, then drives exec cycles: snapshot paths,
//! BeginCycle, exec under a soft deadline, EndCycle, publish state
//! notifications. Completion parks the task again; only cancellation or
//! termination ends it. Every await observes the want's cancel token.

use crate::exec::{CycleOutcome, ExecError, WantRun};
use crate::graph::PathInfo;
use crate::subs::Inbox;
use mw_core::{
    CycleStart, Notification, Packet, Params, StateNotification, Want, WantManifest, WantStatus,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The runtime surface a cycle may touch. Implemented by the runtime's
/// shared state; object-safe so [`Cycle`] stays free of the clock generic.
pub(crate) trait RuntimeOps: Send + Sync {
    fn epoch_ms(&self) -> u64;
    fn want_status(&self, name: &str) -> Option<WantStatus>;
    fn children_of(&self, owner: &str) -> Vec<(String, WantStatus)>;
    fn submit_manifests(&self, manifests: Vec<WantManifest>) -> Result<(), String>;
    /// Called after a packet lands on `consumer`'s channel; records a
    /// retrigger intent when the consumer has already completed.
    fn note_send(&self, consumer: &str);
    fn paths_of(&self, want: &str) -> crate::graph::Paths;
    fn deliver(&self, target: &str, notification: Notification);
    fn broadcast(&self, notification: &Notification);
    fn mark_dirty(&self);
    fn request_reconcile(&self);
    fn driver_tuning(&self) -> DriverTuning;
}

/// The slice of [`crate::RuntimeConfig`] the driver consumes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DriverTuning {
    pub cycle_deadline: std::time::Duration,
    pub error_threshold: u32,
    pub timeout_threshold: u32,
    pub idle_pause: std::time::Duration,
}

/// Context handed to [`WantRun::exec`] for exactly one cycle.
pub struct Cycle<'a> {
    want: &'a Arc<Want>,
    ins: &'a [PathInfo],
    outs: &'a [PathInfo],
    cancel: &'a CancellationToken,
    ops: &'a dyn RuntimeOps,
    params: Params,
    cycle: u64,
    notifications: Vec<Notification>,
    seq: &'a AtomicU64,
    rotate: usize,
    did_io: bool,
    did_state: bool,
}

impl<'a> Cycle<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        want: &'a Arc<Want>,
        ins: &'a [PathInfo],
        outs: &'a [PathInfo],
        cancel: &'a CancellationToken,
        ops: &'a dyn RuntimeOps,
        start: CycleStart,
        notifications: Vec<Notification>,
        seq: &'a AtomicU64,
    ) -> Self {
        let rotate = if ins.is_empty() { 0 } else { (start.cycle as usize) % ins.len() };
        Self {
            want,
            ins,
            outs,
            cancel,
            ops,
            params: start.params,
            cycle: start.cycle,
            notifications,
            seq,
            rotate,
            did_io: false,
            did_state: false,
        }
    }

    // --- identity and declaration -------------------------------------------

    pub fn name(&self) -> &str {
        self.want.name()
    }

    pub fn want(&self) -> &Want {
        self.want
    }

    /// The executing cycle number (1-based).
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Effective parameters for this cycle.
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(Value::as_f64)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    // --- paths --------------------------------------------------------------

    pub fn in_count(&self) -> usize {
        self.ins.len()
    }

    pub fn out_count(&self) -> usize {
        self.outs.len()
    }

    pub fn input(&self, idx: usize) -> Option<&PathInfo> {
        self.ins.get(idx)
    }

    pub fn output(&self, idx: usize) -> Option<&PathInfo> {
        self.outs.get(idx)
    }

    /// Status of the producer behind input `idx`, if it still exists.
    pub fn producer_status(&self, idx: usize) -> Option<WantStatus> {
        self.ins.get(idx).and_then(|p| self.ops.want_status(&p.producer))
    }

    /// True when no input can deliver again: every in-channel is drained and
    /// its producer is gone or done producing.
    pub fn inputs_exhausted(&self) -> bool {
        self.ins.iter().all(|p| {
            if p.channel.has_pending() {
                return false;
            }
            !matches!(
                self.ops.want_status(&p.producer),
                Some(WantStatus::Idle)
                    | Some(WantStatus::Running)
                    | Some(WantStatus::Completing)
                    | Some(WantStatus::Suspended)
            )
        })
    }

    // --- state --------------------------------------------------------------

    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.want.get_state(key)
    }

    pub fn state_u64(&self, key: &str) -> Option<u64> {
        self.want.get_state(key).and_then(|v| v.as_u64())
    }

    /// Buffered store; committed atomically at EndCycle.
    pub fn store_state(&mut self, key: impl Into<String>, value: Value) -> Result<(), ExecError> {
        self.want.store_state(key, value)?;
        self.did_state = true;
        Ok(())
    }

    /// Stage part of a bulk object commit.
    pub fn stage_state_change(&mut self, obj: Value) -> Result<(), ExecError> {
        self.want.stage_state_change(obj)?;
        Ok(())
    }

    /// Publish everything staged as one atomic commit.
    pub fn commit_state_changes(&mut self) -> Result<(), ExecError> {
        let committed = self.want.commit_state_changes(self.ops.epoch_ms())?;
        if !committed.is_empty() {
            self.did_state = true;
        }
        Ok(())
    }

    // --- notifications ------------------------------------------------------

    /// Notifications delivered since the last cycle, oldest first.
    pub fn notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // --- receiving ----------------------------------------------------------

    /// Non-blocking receive from input `idx`.
    pub fn try_recv(&mut self, idx: usize) -> Option<Packet> {
        let packet = self.ins.get(idx)?.channel.try_recv();
        if packet.is_some() {
            self.did_io = true;
        }
        packet
    }

    /// Non-blocking receive from any input, scanning fairly from a
    /// cycle-rotated offset.
    pub fn try_recv_any(&mut self) -> Option<(usize, Packet)> {
        let n = self.ins.len();
        if n == 0 {
            return None;
        }
        for k in 0..n {
            let idx = (self.rotate + k) % n;
            if let Some(packet) = self.ins[idx].channel.try_recv() {
                self.did_io = true;
                self.rotate = (idx + 1) % n;
                return Some((idx, packet));
            }
        }
        None
    }

    /// Blocking receive from input `idx`; `None` once the edge is closed.
    pub async fn recv(&mut self, idx: usize) -> Result<Option<Packet>, ExecError> {
        let Some(path) = self.ins.get(idx) else { return Ok(None) };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExecError::Cancelled),
            packet = path.channel.recv() => {
                if packet.is_some() {
                    self.did_io = true;
                }
                Ok(packet)
            }
        }
    }

    /// Blocking receive from whichever input delivers first (fair select).
    /// `None` when there are no inputs or every input is closed.
    pub async fn recv_any(&mut self) -> Result<Option<(usize, Packet)>, ExecError> {
        if self.ins.is_empty() {
            return Ok(None);
        }
        if let Some(found) = self.try_recv_any() {
            return Ok(Some(found));
        }

        // Slow path: hold every receiver and select across them. Each edge
        // has exactly one consumer (us), so the locks are uncontended.
        let mut guards = Vec::with_capacity(self.ins.len());
        for path in self.ins {
            guards.push(path.channel.rx_handle().lock_owned().await);
        }
        let futures: Vec<_> =
            guards.iter_mut().map(|guard| Box::pin(guard.recv())).collect();
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExecError::Cancelled),
            (packet, idx, _) = futures_util::future::select_all(futures) => {
                match packet {
                    Some(packet) => {
                        self.ins[idx].channel.note_recv();
                        self.did_io = true;
                        self.rotate = (idx + 1) % self.ins.len();
                        Ok(Some((idx, packet)))
                    }
                    None => Ok(None),
                }
            }
        }
    }

    // --- sending ------------------------------------------------------------

    /// Send a packet on output `idx`. Blocks under backpressure, but always
    /// under a select that observes cancellation; a closed edge drops the
    /// packet with a debug log.
    pub async fn send(&mut self, idx: usize, payload: Value) -> Result<(), ExecError> {
        let Some(path) = self.outs.get(idx) else {
            debug!(want = %self.name(), idx, "send on missing output ignored");
            return Ok(());
        };
        let packet =
            Packet::new(self.name(), self.seq.fetch_add(1, Ordering::Relaxed), payload);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExecError::Cancelled),
            sent = path.channel.send(packet) => {
                match sent {
                    Ok(()) => {
                        self.did_io = true;
                        self.ops.note_send(&path.consumer);
                        Ok(())
                    }
                    Err(closed) => {
                        debug!(want = %self.name(), channel = %closed.0, "send on closed channel dropped");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Send the same payload on every output.
    pub async fn send_all(&mut self, payload: Value) -> Result<(), ExecError> {
        for idx in 0..self.outs.len() {
            self.send(idx, payload.clone()).await?;
        }
        Ok(())
    }

    // --- misc ---------------------------------------------------------------

    /// Cancellable sleep (service times etc.).
    pub async fn sleep(&self, duration: std::time::Duration) -> Result<(), ExecError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExecError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Statuses of this want's controller children.
    pub fn children(&self) -> Vec<(String, WantStatus)> {
        self.ops.children_of(self.name())
    }

    /// Submit dynamically composed child wants to the reconciler.
    pub fn submit_children(&mut self, manifests: Vec<WantManifest>) -> Result<(), ExecError> {
        self.ops.submit_manifests(manifests).map_err(ExecError::Fatal)
    }

    pub(crate) fn did_work(&self) -> bool {
        self.did_io || self.did_state
    }
}

/// Control handle the reconciler keeps per driver task.
pub(crate) struct DriverHandle {
    pub cancel: CancellationToken,
    pub wake: Arc<Notify>,
    pub join: JoinHandle<()>,
}

pub(crate) struct Driver {
    want: Arc<Want>,
    run: Box<dyn WantRun>,
    ops: Arc<dyn RuntimeOps>,
    inbox: Arc<Inbox>,
    cancel: CancellationToken,
    wake: Arc<Notify>,
    seq: AtomicU64,
}

impl Driver {
    /// Spawn the want's task. The task parks until started.
    pub(crate) fn spawn(
        want: Arc<Want>,
        run: Box<dyn WantRun>,
        inbox: Arc<Inbox>,
        ops: Arc<dyn RuntimeOps>,
        parent_cancel: &CancellationToken,
    ) -> DriverHandle {
        let cancel = parent_cancel.child_token();
        let wake = Arc::new(Notify::new());
        let driver = Driver {
            want,
            run,
            ops,
            inbox,
            cancel: cancel.clone(),
            wake: Arc::clone(&wake),
            seq: AtomicU64::new(0),
        };
        let join = tokio::spawn(driver.run());
        DriverHandle { cancel, wake, join }
    }

    async fn run(mut self) {
        debug!(want = %self.want.name(), runner = self.run.describe(), "driver started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let status = self.want.status();
            if status == WantStatus::Terminated {
                break;
            }
            if status.is_active() {
                if !self.run_cycles().await {
                    break;
                }
                continue;
            }
            // Parked: wait for the reconciler (start, resume, retrigger).
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {}
            }
        }
        debug!(want = %self.want.name(), "driver exited");
    }

    /// Drive cycles while the want stays active. Returns false when the
    /// task should exit entirely (cancellation), true to park.
    async fn run_cycles(&mut self) -> bool {
        let tuning = self.ops.driver_tuning();
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            if !self.want.status().is_active() {
                return true;
            }

            // Topology changes are observed here, at the top of the cycle.
            let paths = self.ops.paths_of(self.want.name());

            let start = match self.want.begin_cycle(self.ops.epoch_ms()) {
                Ok(start) => start,
                Err(e) => {
                    warn!(want = %self.want.name(), error = %e, "begin cycle rejected");
                    return true;
                }
            };
            let notifications = self.inbox.drain();
            let mut cx = Cycle::new(
                &self.want,
                &paths.ins,
                &paths.outs,
                &self.cancel,
                &*self.ops,
                start,
                notifications,
                &self.seq,
            );

            let result = tokio::time::timeout(tuning.cycle_deadline, self.run.exec(&mut cx)).await;
            let did_work = cx.did_work();
            drop(cx);

            let now = self.ops.epoch_ms();
            let mut exit = false;
            let outcome = match result {
                Err(_elapsed) => {
                    let timeouts = self.want.record_timeout(now);
                    warn!(
                        want = %self.want.name(),
                        timeouts,
                        deadline_ms = tuning.cycle_deadline.as_millis() as u64,
                        "cycle deadline exceeded"
                    );
                    if timeouts >= tuning.timeout_threshold {
                        self.fail("repeated cycle timeouts");
                    }
                    CycleOutcome::Continue
                }
                Ok(Ok(outcome)) => {
                    self.want.reset_failures();
                    outcome
                }
                Ok(Err(ExecError::Cancelled)) => {
                    exit = true;
                    CycleOutcome::Continue
                }
                Ok(Err(ExecError::Fatal(msg))) => {
                    self.fail(&msg);
                    CycleOutcome::Continue
                }
                Ok(Err(e)) => {
                    let errors = self.want.record_exec_error();
                    let _ = self.want.store_state("error_count", Value::from(errors));
                    warn!(want = %self.want.name(), error = %e, errors, "exec error");
                    if errors >= tuning.error_threshold {
                        self.fail(&format!("exec error threshold reached: {}", e));
                    }
                    CycleOutcome::Continue
                }
            };

            match self.want.end_cycle(now) {
                Ok(commit) => {
                    if !commit.changes.is_empty() {
                        self.ops.mark_dirty();
                        self.publish_state(&commit.changes, commit.cycle);
                    }
                    if exit {
                        return false;
                    }
                    if outcome == CycleOutcome::Done {
                        self.complete();
                        return true;
                    }
                    if !did_work && commit.changes.is_empty() {
                        // Avoid spinning when the cycle neither moved data
                        // nor changed state.
                        tokio::select! {
                            _ = self.cancel.cancelled() => return false,
                            _ = tokio::time::sleep(tuning.idle_pause) => {}
                        }
                    }
                }
                Err(e) => {
                    warn!(want = %self.want.name(), error = %e, "end cycle rejected");
                    return !exit;
                }
            }
        }
    }

    fn publish_state(&self, changes: &std::collections::BTreeMap<String, Value>, cycle: u64) {
        let spec = self.want.spec();
        let mut targets: Vec<String> = spec.state_subscriptions.clone();
        if let Some(owner) = self.want.controller_owner() {
            if !targets.iter().any(|t| t == owner) {
                targets.push(owner.to_string());
            }
        }
        for (key, value) in changes {
            let notification = Notification::State(StateNotification {
                source: self.want.name().to_string(),
                key: key.clone(),
                value: value.clone(),
                cycle,
            });
            for target in &targets {
                self.ops.deliver(target, notification.clone());
            }
            self.ops.broadcast(&notification);
        }
    }

    fn complete(&mut self) {
        if self.want.set_status(WantStatus::Completing).is_err() {
            // Suspended or terminated mid-cycle; the outcome re-derives on
            // the next activation.
            debug!(want = %self.want.name(), "completion deferred");
            return;
        }
        if let Err(e) = self.want.set_status(WantStatus::Completed) {
            warn!(want = %self.want.name(), error = %e, "completion rejected");
            return;
        }
        self.run.on_ended(&self.want);
        info!(
            want = %self.want.name(),
            cycles = self.want.cycle(),
            "want completed"
        );
        if let Some(owner) = self.want.controller_owner() {
            self.ops.deliver(
                owner,
                Notification::ChildCompleted { child: self.want.name().to_string() },
            );
        }
        self.ops.mark_dirty();
        self.ops.request_reconcile();
    }

    fn fail(&self, msg: &str) {
        if self.want.set_status(WantStatus::Failed).is_ok() {
            let _ = self.want.store_state("error", Value::String(msg.to_string()));
            error!(want = %self.want.name(), error = msg, "want failed");
            self.ops.mark_dirty();
            self.ops.request_reconcile();
        }
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
