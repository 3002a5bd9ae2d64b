// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner: composes children from a recipe and completes when they do.

use crate::driver::Cycle;
use crate::exec::{CycleOutcome, ExecError, WantRole, WantRun};
use async_trait::async_trait;
use mw_config::{load_recipe, ParamKind, ParamSchema, WantTypeDefinition};
use mw_core::{Params, WantStatus};
use serde_json::json;
use std::path::Path;

pub(crate) fn definition() -> WantTypeDefinition {
    WantTypeDefinition::new("owner")
        .describe("expands a recipe into controller children and completes when all of them do")
        .parameter(ParamSchema::new("recipe", ParamKind::String).required())
        .parameter(ParamSchema::new("parameters", ParamKind::Object))
        .state_key("expanded", ParamKind::Bool, true)
        .state_key("children", ParamKind::List, true)
        .connectivity(WantRole::Independent.connectivity())
}

/// Loads its recipe on the first cycle, submits the expanded children as
/// dynamic adds (each carrying a controller reference back to the owner),
/// then stays Running until every controller child is Completed.
#[derive(Debug, Default)]
pub struct Owner {
    expanded: bool,
}

#[async_trait]
impl WantRun for Owner {
    async fn exec(&mut self, cx: &mut Cycle<'_>) -> Result<CycleOutcome, ExecError> {
        let already = self.expanded
            || cx.get_state("expanded").and_then(|v| v.as_bool()).unwrap_or(false);
        if !already {
            self.expand(cx)?;
            self.expanded = true;
            return Ok(CycleOutcome::Continue);
        }

        let children = cx.children();
        if !children.is_empty()
            && children.iter().all(|(_, status)| *status == WantStatus::Completed)
        {
            cx.store_state("children_completed", json!(children.len()))?;
            return Ok(CycleOutcome::Done);
        }
        Ok(CycleOutcome::Continue)
    }

    fn describe(&self) -> &str {
        "owner"
    }
}

impl Owner {
    fn expand(&self, cx: &mut Cycle<'_>) -> Result<(), ExecError> {
        let path = cx
            .param_str("recipe")
            .map(str::to_string)
            .ok_or_else(|| ExecError::fatal("owner requires a 'recipe' parameter"))?;
        let overrides: Params = match cx.param("parameters") {
            Some(serde_json::Value::Object(map)) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            _ => Params::new(),
        };

        let recipe =
            load_recipe(Path::new(&path)).map_err(|e| ExecError::fatal(e.to_string()))?;
        let children = recipe
            .expand(&overrides, Some(cx.name()))
            .map_err(|e| ExecError::fatal(e.to_string()))?;
        let names: Vec<String> = children.iter().map(|c| c.name().to_string()).collect();

        cx.submit_children(children)?;
        cx.store_state("children", json!(names))?;
        cx.store_state("expanded", json!(true))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "owner_tests.rs"]
mod tests;
