// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator: fans in N inputs and completes on quorum.

use crate::driver::Cycle;
use crate::exec::{CycleOutcome, ExecError, WantRole, WantRun};
use async_trait::async_trait;
use mw_config::{ParamKind, ParamSchema, WantTypeDefinition};
use serde_json::{json, Value};

pub(crate) fn definition() -> WantTypeDefinition {
    WantTypeDefinition::new("coordinator")
        .describe("completes once a quorum of inputs has delivered")
        .parameter(
            ParamSchema::new("required", ParamKind::Int)
                .with_default(json!(0))
                .range(0.0, 1e6),
        )
        .state_key("schedules", ParamKind::List, true)
        .state_key("sources", ParamKind::Int, true)
        .connectivity(WantRole::Coordinator.connectivity())
}

/// Collects the latest payload per source into `state.schedules` and
/// completes once `required` distinct sources have delivered (`0` means
/// every connected input). A retriggering child replaces its entry and the
/// coordinator re-completes.
#[derive(Debug, Default)]
pub struct Coordinator;

#[async_trait]
impl WantRun for Coordinator {
    async fn exec(&mut self, cx: &mut Cycle<'_>) -> Result<CycleOutcome, ExecError> {
        let required = cx.param_u64("required").unwrap_or(0) as usize;
        let quorum = if required == 0 { cx.in_count() } else { required };

        let mut schedules: Vec<Value> = cx
            .get_state("schedules")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        let mut changed = false;

        while let Some((_, packet)) = cx.try_recv_any() {
            let entry = json!({ "source": packet.source, "payload": packet.payload });
            match schedules.iter_mut().find(|s| s["source"] == json!(packet.source)) {
                Some(slot) => *slot = entry,
                None => schedules.push(entry),
            }
            changed = true;
        }

        if changed {
            cx.store_state("sources", json!(schedules.len()))?;
            cx.store_state("schedules", json!(schedules))?;
        }
        if quorum > 0 && schedules.len() >= quorum {
            return Ok(CycleOutcome::Done);
        }
        Ok(CycleOutcome::Continue)
    }

    fn describe(&self) -> &str {
        "coordinator"
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
