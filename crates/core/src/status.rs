// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Want lifecycle status and the validated transition table.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a want.
///
/// Idle → Running → {Completing → Completed | Failed}; Completed → Idle is
/// the retrigger arming; any non-terminal status may be Suspended (the prior
/// status is stashed and restored on resume); Terminated is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WantStatus {
    Idle,
    Running,
    Completing,
    Completed,
    Failed,
    Suspended,
    Terminated,
}

impl Default for WantStatus {
    fn default() -> Self {
        WantStatus::Idle
    }
}

impl WantStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WantStatus::Terminated)
    }

    /// Statuses whose driver is actively cycling.
    pub fn is_active(&self) -> bool {
        matches!(self, WantStatus::Running | WantStatus::Completing)
    }

    /// Whether a transition from `self` to `to` is legal.
    ///
    /// Same-status transitions are legal no-ops. Suspension is legal from any
    /// non-terminal status; leaving Suspended goes through `Want::resume`,
    /// which restores the stashed status, so the only direct exit here is
    /// Terminated.
    pub fn can_transition(self, to: WantStatus) -> bool {
        use WantStatus::*;
        if self == to {
            return true;
        }
        if to == Terminated {
            return self != Terminated;
        }
        if to == Suspended {
            return !matches!(self, Terminated);
        }
        match (self, to) {
            (Idle, Running) | (Idle, Failed) => true,
            (Running, Completing) | (Running, Completed) | (Running, Failed) => true,
            (Completing, Completed) | (Completing, Failed) => true,
            // Retrigger: the only backward transition.
            (Completed, Idle) => true,
            _ => false,
        }
    }
}

crate::simple_display! {
    WantStatus {
        Idle => "idle",
        Running => "running",
        Completing => "completing",
        Completed => "completed",
        Failed => "failed",
        Suspended => "suspended",
        Terminated => "terminated",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
