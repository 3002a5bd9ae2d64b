// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers and proptest strategies.

#[cfg(any(test, feature = "test-support"))]
pub mod strategies {
    use crate::label::{Labels, Selector};
    use proptest::prelude::*;

    /// Lowercase identifier-ish label keys/values.
    pub fn label_token() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,8}".prop_map(|s| s)
    }

    pub fn labels(max: usize) -> impl Strategy<Value = Labels> {
        proptest::collection::btree_map(label_token(), label_token(), 0..=max)
    }

    pub fn selector(max: usize) -> impl Strategy<Value = Selector> {
        proptest::collection::btree_map(label_token(), label_token(), 1..=max)
            .prop_map(Selector)
    }
}
