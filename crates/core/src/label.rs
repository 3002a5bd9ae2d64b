// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Labels and selector matching.
//!
//! Wants carry a flat string→string label map; consumers declare their
//! inputs as selectors. A selector matches a producer when every selector
//! pair is present in the producer's labels (subset match, exact values).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label map attached to a want's metadata. Sorted for deterministic
/// serialization and hashing.
pub type Labels = BTreeMap<String, String>;

/// A label selector: the `using` / `usingGlobal` entry unit.
///
/// Matches any want whose labels are a superset of the selector pairs.
/// An empty selector matches nothing (a want with no declared inputs has an
/// empty `using` list, not an empty selector).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(pub BTreeMap<String, String>);

impl Selector {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a selector from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Subset match: every selector pair must appear in `labels` with an
    /// equal value. Empty selectors never match.
    pub fn matches(&self, labels: &Labels) -> bool {
        !self.0.is_empty() && self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "label_tests.rs"]
mod tests;
