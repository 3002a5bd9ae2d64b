// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generator: emits a bounded stream of packets, one per cycle.

use crate::driver::Cycle;
use crate::exec::{CycleOutcome, ExecError, WantRole, WantRun};
use async_trait::async_trait;
use mw_config::{ParamKind, ParamSchema, WantTypeDefinition};
use serde_json::json;

pub(crate) fn definition() -> WantTypeDefinition {
    WantTypeDefinition::new("generator")
        .describe("emits `count` packets, one per cycle")
        .parameter(
            ParamSchema::new("count", ParamKind::Int)
                .with_default(json!(10))
                .range(0.0, 1e9),
        )
        .state_key("emitted", ParamKind::Int, true)
        .connectivity(WantRole::Generator.connectivity())
}

/// Emits `{"seq": n}` packets until the target is reached.
///
/// The target re-reads `state.count` before `params.count` each cycle, so
/// an external state mutation on a completed generator raises the target
/// and a retrigger produces the extra packets.
#[derive(Debug, Default)]
pub struct Generator;

#[async_trait]
impl WantRun for Generator {
    async fn exec(&mut self, cx: &mut Cycle<'_>) -> Result<CycleOutcome, ExecError> {
        let target = cx.state_u64("count").or_else(|| cx.param_u64("count")).unwrap_or(0);
        let emitted = cx.state_u64("emitted").unwrap_or(0);
        if emitted >= target {
            return Ok(CycleOutcome::Done);
        }
        cx.send_all(json!({ "seq": emitted })).await?;
        cx.store_state("emitted", json!(emitted + 1))?;
        Ok(CycleOutcome::Continue)
    }

    fn describe(&self) -> &str {
        "generator"
    }
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
