// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The capability interface implemented by every want type.

use crate::driver::Cycle;
use async_trait::async_trait;
use mw_core::{Connectivity, Want, WantError};
use thiserror::Error;

/// What a cycle asks the driver to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Run another cycle.
    Continue,
    /// The want's outcome is reached; transition to Completed and park.
    Done,
}

/// Errors returned from [`WantRun::exec`].
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Want(#[from] WantError),

    /// The want's cancel signal fired mid-cycle.
    #[error("cancelled")]
    Cancelled,

    /// Recoverable failure; counted, escalates to Failed past a threshold.
    #[error("{0}")]
    Failed(String),

    /// Unrecoverable failure; the want is marked Failed immediately.
    #[error("{0}")]
    Fatal(String),
}

impl ExecError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ExecError::Failed(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        ExecError::Fatal(msg.into())
    }
}

/// One cycle's worth of behavior for a want.
///
/// Implementations own no shared mutable data: everything they touch goes
/// through the [`Cycle`] context (channels, buffered state, notifications).
/// Parameters must be re-read each cycle; staged parameter updates become
/// visible at cycle start.
#[async_trait]
pub trait WantRun: Send {
    /// Run one cycle. Every await inside must come from the context so the
    /// cancel signal is always observed.
    async fn exec(&mut self, cx: &mut Cycle<'_>) -> Result<CycleOutcome, ExecError>;

    /// Short human-readable description of the runner.
    fn describe(&self) -> &str;

    /// Called once after the want transitions to Completed.
    fn on_ended(&mut self, _want: &Want) {}
}

/// Well-known want categories used for connectivity defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WantRole {
    Generator,
    Processor,
    Sink,
    Coordinator,
    Independent,
}

mw_core::simple_display! {
    WantRole {
        Generator => "generator",
        Processor => "processor",
        Sink => "sink",
        Coordinator => "coordinator",
        Independent => "independent",
    }
}

impl WantRole {
    /// Default connectivity bounds for the role; explicit definitions
    /// override these.
    pub fn connectivity(&self) -> Connectivity {
        const NONE: i32 = 0;
        const ANY: i32 = Connectivity::UNLIMITED;
        match self {
            WantRole::Generator => Connectivity::new(0, 1, NONE, ANY),
            WantRole::Processor => Connectivity::new(1, 1, ANY, ANY),
            WantRole::Sink => Connectivity::new(1, 0, ANY, NONE),
            WantRole::Coordinator => Connectivity::new(1, 0, ANY, ANY),
            WantRole::Independent => Connectivity::default(),
        }
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
