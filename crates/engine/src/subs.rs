// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification fan-out.
//!
//! Every want has an inbox drained at the top of its cycles; external
//! watchers get their own inbox. Buffers are bounded and drop-oldest with a
//! logged warning: state is the authoritative store and can be re-read, so
//! a lagging subscriber loses nothing durable.

use mw_core::Notification;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

mw_core::define_id! {
    /// Identifier for an external notification watcher.
    pub struct SubscriberId("sub-");
}

/// A bounded FIFO of notifications for one subscriber.
///
/// Ordering per (source, key) is preserved: every notification from a
/// source passes through this single queue in commit order.
pub struct Inbox {
    name: String,
    cap: usize,
    buf: Mutex<VecDeque<Notification>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl Inbox {
    fn new(name: impl Into<String>, cap: usize) -> Self {
        Self {
            name: name.into(),
            cap: cap.max(1),
            buf: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn push(&self, notification: Notification) {
        {
            let mut buf = self.buf.lock();
            if buf.len() == self.cap {
                buf.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    subscriber = %self.name,
                    dropped,
                    "notification buffer full, dropping oldest"
                );
            }
            buf.push_back(notification);
        }
        self.notify.notify_one();
    }

    /// Take everything queued, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        self.buf.lock().drain(..).collect()
    }

    /// Await the next notification.
    pub async fn recv(&self) -> Notification {
        loop {
            if let Some(n) = self.buf.lock().pop_front() {
                return n;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.lock().is_empty()
    }

    /// Notifications lost to the bound so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// An external watcher's handle; drop it and unsubscribe via the runtime.
pub struct SubscriptionHandle {
    pub id: SubscriberId,
    inbox: Arc<Inbox>,
}

impl SubscriptionHandle {
    pub async fn recv(&self) -> Notification {
        self.inbox.recv().await
    }

    pub fn drain(&self) -> Vec<Notification> {
        self.inbox.drain()
    }
}

/// Routes notifications to want inboxes and external watchers.
#[derive(Default)]
pub(crate) struct SubscriptionHub {
    cap: usize,
    wants: Mutex<HashMap<String, Arc<Inbox>>>,
    watchers: Mutex<HashMap<SubscriberId, Arc<Inbox>>>,
}

impl SubscriptionHub {
    pub(crate) fn new(cap: usize) -> Self {
        Self { cap, wants: Mutex::default(), watchers: Mutex::default() }
    }

    pub(crate) fn register_want(&self, name: &str) -> Arc<Inbox> {
        let inbox = Arc::new(Inbox::new(name, self.cap));
        self.wants.lock().insert(name.to_string(), Arc::clone(&inbox));
        inbox
    }

    pub(crate) fn remove_want(&self, name: &str) {
        self.wants.lock().remove(name);
    }

    /// Deliver to a want's inbox; false if no such subscriber.
    pub(crate) fn deliver(&self, name: &str, notification: Notification) -> bool {
        let inbox = self.wants.lock().get(name).cloned();
        match inbox {
            Some(inbox) => {
                inbox.push(notification);
                true
            }
            None => false,
        }
    }

    /// Copy to every external watcher.
    pub(crate) fn broadcast(&self, notification: &Notification) {
        for inbox in self.watchers.lock().values() {
            inbox.push(notification.clone());
        }
    }

    pub(crate) fn watch(&self) -> SubscriptionHandle {
        let id = SubscriberId::new();
        let inbox = Arc::new(Inbox::new(id.as_str(), self.cap));
        self.watchers.lock().insert(id, Arc::clone(&inbox));
        SubscriptionHandle { id, inbox }
    }

    pub(crate) fn unwatch(&self, id: SubscriberId) -> bool {
        self.watchers.lock().remove(&id).is_some()
    }
}

#[cfg(test)]
#[path = "subs_tests.rs"]
mod tests;
