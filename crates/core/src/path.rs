// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packets, edge naming, and connectivity bounds.
//!
//! Edges themselves (bounded channels) live in the engine; this module holds
//! the data-model pieces shared by the engine, config validation, and
//! snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An opaque item carried across an edge.
///
/// `seq` is the producer-local emission counter, used for log correlation
/// only; consumers must not assume global ordering across producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub source: String,
    pub seq: u64,
    pub payload: Value,
}

impl Packet {
    pub fn new(source: impl Into<String>, seq: u64, payload: Value) -> Self {
        Self { source: source.into(), seq, payload }
    }
}

/// Canonical edge name for a producer→consumer pair.
///
/// Edge identity is (producer, consumer, local/global); the name encodes all
/// three, so the channel map can key on it.
pub fn edge_name(producer: &str, consumer: &str, global: bool) -> String {
    if global {
        format!("{}_global_to_{}", producer, consumer)
    } else {
        format!("{}_to_{}", producer, consumer)
    }
}

/// Connectivity bounds declared by a want type. `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Connectivity {
    pub required_inputs: i32,
    pub required_outputs: i32,
    pub max_inputs: i32,
    pub max_outputs: i32,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self {
            required_inputs: 0,
            required_outputs: 0,
            max_inputs: Self::UNLIMITED,
            max_outputs: Self::UNLIMITED,
        }
    }
}

/// A want whose resolved edge counts violate its connectivity bounds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectivityIssue {
    #[error("{inputs} input(s) resolved, {required} required")]
    MissingInputs { inputs: usize, required: i32 },
    #[error("{outputs} output(s) resolved, {required} required")]
    MissingOutputs { outputs: usize, required: i32 },
    #[error("{inputs} input(s) resolved, at most {max} allowed")]
    TooManyInputs { inputs: usize, max: i32 },
    #[error("{outputs} output(s) resolved, at most {max} allowed")]
    TooManyOutputs { outputs: usize, max: i32 },
}

impl Connectivity {
    pub const UNLIMITED: i32 = -1;

    pub fn new(
        required_inputs: i32,
        required_outputs: i32,
        max_inputs: i32,
        max_outputs: i32,
    ) -> Self {
        Self { required_inputs, required_outputs, max_inputs, max_outputs }
    }

    /// Whether the required minimums are met (the start gate).
    pub fn satisfied(&self, inputs: usize, outputs: usize) -> bool {
        inputs as i64 >= self.required_inputs.max(0) as i64
            && outputs as i64 >= self.required_outputs.max(0) as i64
    }

    /// Full validation against both minimums and maximums.
    pub fn check(&self, inputs: usize, outputs: usize) -> Result<(), ConnectivityIssue> {
        if (inputs as i64) < self.required_inputs.max(0) as i64 {
            return Err(ConnectivityIssue::MissingInputs {
                inputs,
                required: self.required_inputs,
            });
        }
        if (outputs as i64) < self.required_outputs.max(0) as i64 {
            return Err(ConnectivityIssue::MissingOutputs {
                outputs,
                required: self.required_outputs,
            });
        }
        if self.max_inputs != Self::UNLIMITED && inputs as i64 > self.max_inputs as i64 {
            return Err(ConnectivityIssue::TooManyInputs { inputs, max: self.max_inputs });
        }
        if self.max_outputs != Self::UNLIMITED && outputs as i64 > self.max_outputs as i64 {
            return Err(ConnectivityIssue::TooManyOutputs { outputs, max: self.max_outputs });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
