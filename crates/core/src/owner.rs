// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner references for recipe-composed wants.
//!
//! Ownership is modeled as name references resolved through the runtime
//! index, never as back-pointers. The reference graph must form a DAG;
//! cycles are rejected when a configuration is registered.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A reference from a child want to its owner.
///
/// `controller: true` marks the authoritative lifecycle owner; a want has at
/// most one controller reference. `block_owner_deletion` turns cascade
/// deletion of the owner into a refusal while this child exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub name: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}

impl OwnerReference {
    pub fn controller(name: impl Into<String>) -> Self {
        Self { name: name.into(), controller: true, block_owner_deletion: false }
    }
}

/// Owner reference graph contains a cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("owner references form a cycle through '{through}'")]
pub struct OwnerCycle {
    pub through: String,
}

/// Validate that owner references across `wants` form a DAG.
///
/// `wants` maps each want name to the owner names it references. References
/// to names outside the set are ignored (the owner may live in an outer
/// graph); only cycles within the set are rejected.
pub fn validate_owner_dag<'a>(
    wants: impl IntoIterator<Item = (&'a str, Vec<&'a str>)>,
) -> Result<(), OwnerCycle> {
    let edges: HashMap<&str, Vec<&str>> = wants.into_iter().collect();
    let mut done: HashSet<&str> = HashSet::new();

    for &start in edges.keys() {
        if done.contains(start) {
            continue;
        }
        // Iterative DFS with an explicit on-path set.
        let mut on_path: Vec<&str> = Vec::new();
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        while let Some((node, next)) = stack.pop() {
            if next == 0 {
                if on_path.contains(&node) {
                    return Err(OwnerCycle { through: node.to_string() });
                }
                if done.contains(node) {
                    continue;
                }
                on_path.push(node);
            }
            let owners = edges.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next < owners.len() {
                stack.push((node, next + 1));
                let owner = owners[next];
                if edges.contains_key(owner) {
                    stack.push((owner, 0));
                }
            } else {
                on_path.pop();
                done.insert(node);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "owner_tests.rs"]
mod tests;
