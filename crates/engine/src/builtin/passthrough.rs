// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Passthrough: forwards payloads verbatim.

use crate::driver::Cycle;
use crate::exec::{CycleOutcome, ExecError, WantRole, WantRun};
use async_trait::async_trait;
use mw_config::WantTypeDefinition;

pub(crate) fn definition() -> WantTypeDefinition {
    WantTypeDefinition::new("passthrough")
        .describe("forwards payloads verbatim")
        .connectivity(WantRole::Independent.connectivity())
}

#[derive(Debug, Default)]
pub struct Passthrough;

#[async_trait]
impl WantRun for Passthrough {
    async fn exec(&mut self, cx: &mut Cycle<'_>) -> Result<CycleOutcome, ExecError> {
        let mut moved = false;
        while let Some((_, packet)) = cx.try_recv_any() {
            cx.send_all(packet.payload).await?;
            moved = true;
        }
        if !moved && cx.inputs_exhausted() {
            return Ok(CycleOutcome::Done);
        }
        Ok(CycleOutcome::Continue)
    }

    fn describe(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
#[path = "passthrough_tests.rs"]
mod tests;
