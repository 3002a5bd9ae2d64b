// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The channel graph: bounded edges and per-want path views.
//!
//! One channel per edge name, shared by both endpoints. Channels carry a
//! depth gauge so the reconciler can peek "is data pending" without
//! consuming (re-arming completed consumers needs a non-destructive check).

use crate::resolver::EdgeSpec;
use mw_core::Packet;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

/// The consumer endpoint has gone away.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("channel '{0}' is closed")]
pub struct ChannelClosed(pub String);

type Rx = Arc<AsyncMutex<mpsc::Receiver<Packet>>>;

/// A bounded edge between two wants. Cloning yields another handle to the
/// same underlying channel; edge identity is handle identity.
#[derive(Clone)]
pub struct Channel {
    name: Arc<str>,
    tx: mpsc::Sender<Packet>,
    rx: Rx,
    /// Sends minus receives. Transiently off by one around a racing
    /// send/recv pair, which is fine for an advisory gauge.
    depth: Arc<AtomicI64>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("name", &self.name).field("depth", &self.len()).finish()
    }
}

impl Channel {
    pub(crate) fn bounded(name: &str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            name: Arc::from(name),
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
            depth: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocking send; waits while the channel is full.
    pub async fn send(&self, packet: Packet) -> Result<(), ChannelClosed> {
        self.tx
            .send(packet)
            .await
            .map_err(|_| ChannelClosed(self.name.to_string()))?;
        self.depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Blocking receive; `None` once the channel is closed and drained.
    pub async fn recv(&self) -> Option<Packet> {
        let packet = self.rx.lock().await.recv().await;
        if packet.is_some() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }
        packet
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<Packet> {
        let mut rx = self.rx.try_lock().ok()?;
        match rx.try_recv() {
            Ok(packet) => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                Some(packet)
            }
            Err(_) => None,
        }
    }

    /// Non-destructive "is data buffered" peek.
    pub fn has_pending(&self) -> bool {
        self.depth.load(Ordering::SeqCst) > 0
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Whether two handles reference the same underlying channel.
    pub fn same_channel(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.depth, &other.depth)
    }

    pub(crate) fn rx_handle(&self) -> Rx {
        Arc::clone(&self.rx)
    }

    pub(crate) fn note_recv(&self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One edge from a want's point of view.
#[derive(Debug, Clone)]
pub struct PathInfo {
    pub name: String,
    pub producer: String,
    pub consumer: String,
    pub global: bool,
    pub active: bool,
    pub channel: Channel,
}

/// Ordered edge views for one want. The order of `ins` is contract-visible:
/// local-using entries first (declaration order), then global-using entries.
#[derive(Debug, Clone, Default)]
pub struct Paths {
    pub ins: Vec<PathInfo>,
    pub outs: Vec<PathInfo>,
}

impl Paths {
    pub fn in_count(&self) -> usize {
        self.ins.len()
    }

    pub fn out_count(&self) -> usize {
        self.outs.len()
    }
}

/// Summary of one topology rebuild.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RebuildStats {
    pub allocated: usize,
    pub reused: usize,
    pub dropped: usize,
}

/// Canonical channel store plus per-want path views. Written only by the
/// reconciler; drivers snapshot the paths they need at cycle start.
#[derive(Default)]
pub struct Topology {
    channels: HashMap<String, Channel>,
    paths: HashMap<String, Paths>,
}

impl Topology {
    /// Rebuild from the resolved edge set. Channels keep their identity by
    /// edge name; channels for edges no longer present are dropped (which
    /// closes them once path holders let go).
    pub fn rebuild(&mut self, edges: &[EdgeSpec], capacity: usize) -> RebuildStats {
        let mut stats = RebuildStats::default();
        let mut channels = HashMap::with_capacity(edges.len());
        let mut paths: HashMap<String, Paths> = HashMap::new();

        for edge in edges {
            let name = edge.name();
            let channel = match self.channels.remove(&name) {
                Some(existing) => {
                    stats.reused += 1;
                    existing
                }
                None => {
                    stats.allocated += 1;
                    Channel::bounded(&name, capacity)
                }
            };
            let info = PathInfo {
                name: name.clone(),
                producer: edge.producer.clone(),
                consumer: edge.consumer.clone(),
                global: edge.global,
                active: true,
                channel: channel.clone(),
            };
            paths.entry(edge.consumer.clone()).or_default().ins.push(info.clone());
            paths.entry(edge.producer.clone()).or_default().outs.push(info);
            channels.insert(name, channel);
        }

        stats.dropped = self.channels.len();
        if stats.dropped > 0 {
            for name in self.channels.keys() {
                debug!(channel = %name, "dropping removed channel");
            }
        }
        self.channels = channels;
        self.paths = paths;
        stats
    }

    /// Snapshot the path views for one want (empty when it has no edges).
    pub fn paths_for(&self, want: &str) -> Paths {
        self.paths.get(want).cloned().unwrap_or_default()
    }

    pub fn channel(&self, edge: &str) -> Option<&Channel> {
        self.channels.get(edge)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
