// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue: forwards packets after an optional service delay.

use crate::driver::Cycle;
use crate::exec::{CycleOutcome, ExecError, WantRole, WantRun};
use async_trait::async_trait;
use mw_config::{ParamKind, ParamSchema, WantTypeDefinition};
use serde_json::json;
use std::time::Duration;

pub(crate) fn definition() -> WantTypeDefinition {
    WantTypeDefinition::new("queue")
        .describe("FIFO processor with a configurable service time")
        .parameter(
            ParamSchema::new("service_time", ParamKind::Float)
                .with_default(json!(0.0))
                .range(0.0, 300.0),
        )
        .state_key("total_processed", ParamKind::Int, true)
        .connectivity(WantRole::Processor.connectivity())
}

/// Drains available input, forwards each payload to every output, and
/// completes once every input is drained with no producer left to deliver.
#[derive(Debug, Default)]
pub struct Queue;

#[async_trait]
impl WantRun for Queue {
    async fn exec(&mut self, cx: &mut Cycle<'_>) -> Result<CycleOutcome, ExecError> {
        let service = cx.param_f64("service_time").unwrap_or(0.0);
        let mut processed = cx.state_u64("total_processed").unwrap_or(0);
        let mut moved = false;

        while let Some((_, packet)) = cx.try_recv_any() {
            if service > 0.0 {
                cx.sleep(Duration::from_secs_f64(service)).await?;
            }
            cx.send_all(packet.payload).await?;
            processed += 1;
            moved = true;
        }

        if moved {
            cx.store_state("total_processed", json!(processed))?;
            return Ok(CycleOutcome::Continue);
        }
        if cx.inputs_exhausted() {
            return Ok(CycleOutcome::Done);
        }
        Ok(CycleOutcome::Continue)
    }

    fn describe(&self) -> &str {
        "queue"
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
