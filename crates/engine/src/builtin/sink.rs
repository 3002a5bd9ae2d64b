// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sink: counts everything it consumes.

use crate::driver::Cycle;
use crate::exec::{CycleOutcome, ExecError, WantRole, WantRun};
use async_trait::async_trait;
use mw_config::{ParamKind, WantTypeDefinition};
use serde_json::json;

pub(crate) fn definition() -> WantTypeDefinition {
    WantTypeDefinition::new("sink")
        .describe("terminal consumer; counts received packets")
        .state_key("total_processed", ParamKind::Int, true)
        .state_key("cycle_count", ParamKind::Int, true)
        .connectivity(WantRole::Sink.connectivity())
}

/// Counts received packets in `total_processed`; `cycle_count` counts the
/// cycles that consumed at least one packet. Completes when inputs are
/// exhausted.
#[derive(Debug, Default)]
pub struct Sink;

#[async_trait]
impl WantRun for Sink {
    async fn exec(&mut self, cx: &mut Cycle<'_>) -> Result<CycleOutcome, ExecError> {
        let mut total = cx.state_u64("total_processed").unwrap_or(0);
        let mut received = 0u64;

        while let Some((_, packet)) = cx.try_recv_any() {
            total += 1;
            received += 1;
            cx.store_state("last_payload", packet.payload)?;
        }
        if received > 0 {
            let consuming = cx.state_u64("cycle_count").unwrap_or(0);
            cx.store_state("total_processed", json!(total))?;
            cx.store_state("cycle_count", json!(consuming + 1))?;
        }

        if cx.inputs_exhausted() {
            return Ok(CycleOutcome::Done);
        }
        Ok(CycleOutcome::Continue)
    }

    fn describe(&self) -> &str {
        "sink"
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
