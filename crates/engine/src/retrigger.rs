// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retrigger intents: re-arming completed wants when upstream data arrives.
//!
//! There is no trigger queue. Sends into a Completed consumer record an
//! intent here; the reconciler drains intents on its tick (alongside a
//! non-destructive peek at input channels) and transitions the consumer
//! Completed→Idle. Ordering comes from channel order plus tick cadence.

use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Default)]
pub(crate) struct RetriggerBus {
    intents: Mutex<HashSet<String>>,
}

impl RetriggerBus {
    /// Record a re-arm intent; true if this is a new intent.
    pub(crate) fn record(&self, consumer: &str) -> bool {
        self.intents.lock().insert(consumer.to_string())
    }

    /// Take all pending intents.
    pub(crate) fn drain(&self) -> Vec<String> {
        self.intents.lock().drain().collect()
    }

    /// Drop the intent for a want (deleted or suspended mid-tick).
    pub(crate) fn cancel(&self, name: &str) {
        self.intents.lock().remove(name);
    }
}

#[cfg(test)]
#[path = "retrigger_tests.rs"]
mod tests;
