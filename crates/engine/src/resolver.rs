// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Label-selector edge resolution.
//!
//! Pure functions from want declarations to edge specs. Determinism is part
//! of the contract: consumers are visited in name order, selectors in
//! declaration order, and matching producers in lexicographic name order,
//! so the resolved edge list (and with it every want's path order) is
//! stable across passes for unchanged topology.

use mw_core::{edge_name, Labels, Selector};
use std::collections::{HashMap, HashSet};

/// One resolved producer→consumer edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeSpec {
    pub producer: String,
    pub consumer: String,
    pub global: bool,
}

impl EdgeSpec {
    /// Canonical channel-map key for this edge.
    pub fn name(&self) -> String {
        edge_name(&self.producer, &self.consumer, self.global)
    }
}

/// The slice of a want the resolver needs.
#[derive(Debug, Clone, Copy)]
pub struct WantView<'a> {
    pub name: &'a str,
    pub labels: &'a Labels,
    /// Controller owner name; `None` for top-level wants.
    pub owner: Option<&'a str>,
    pub using: &'a [Selector],
    pub using_global: &'a [Selector],
}

/// Whether a *local* selector may wire these two wants: same composition
/// family only. Global selectors cross recipe boundaries; local ones never
/// do.
fn same_family(producer: &WantView<'_>, consumer: &WantView<'_>) -> bool {
    producer.owner == consumer.owner
        || producer.owner == Some(consumer.name)
        || consumer.owner == Some(producer.name)
}

/// Resolve every edge declared by `wants`.
///
/// For each consumer, local selectors resolve first (declaration order),
/// then global selectors; within one selector, producers tie-break by name.
/// Local selectors stay within the consumer's composition family (siblings
/// under one controller owner, the owner itself, or the top-level graph);
/// global selectors match everywhere. Self-edges are skipped. Duplicate
/// edges collapse to the first occurrence.
pub fn resolve_edges(wants: &[WantView<'_>]) -> Vec<EdgeSpec> {
    let mut producers: Vec<&WantView> = wants.iter().collect();
    producers.sort_by_key(|w| w.name);
    let mut consumers: Vec<&WantView> = wants.iter().collect();
    consumers.sort_by_key(|w| w.name);

    let mut edges = Vec::new();
    let mut seen = HashSet::new();
    for consumer in &consumers {
        for (global, selectors) in [(false, consumer.using), (true, consumer.using_global)] {
            for selector in selectors {
                for producer in &producers {
                    if producer.name == consumer.name || !selector.matches(producer.labels) {
                        continue;
                    }
                    if !global && !same_family(producer, consumer) {
                        continue;
                    }
                    let edge = EdgeSpec {
                        producer: producer.name.to_string(),
                        consumer: consumer.name.to_string(),
                        global,
                    };
                    if seen.insert(edge.clone()) {
                        edges.push(edge);
                    }
                }
            }
        }
    }
    edges
}

/// Dependency level per want: longest producer chain feeding it.
///
/// Sources sit at level 0; every consumer sits above its highest producer.
/// Label cycles are tolerated by bounding relaxation at the want count.
pub fn dependency_levels(
    names: impl IntoIterator<Item = String>,
    edges: &[EdgeSpec],
) -> HashMap<String, u32> {
    let mut levels: HashMap<String, u32> = names.into_iter().map(|n| (n, 0)).collect();
    for _ in 0..levels.len() {
        let mut changed = false;
        for edge in edges {
            let Some(&p) = levels.get(&edge.producer) else { continue };
            let Some(&c) = levels.get(&edge.consumer) else { continue };
            if c < p + 1 {
                levels.insert(edge.consumer.clone(), p + 1);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    levels
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
