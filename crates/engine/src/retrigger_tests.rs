// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn record_reports_new_intents() {
    let bus = RetriggerBus::default();
    assert!(bus.record("c"));
    assert!(!bus.record("c"));
}

#[test]
fn drain_takes_everything() {
    let bus = RetriggerBus::default();
    bus.record("a");
    bus.record("b");
    let mut drained = bus.drain();
    drained.sort();
    assert_eq!(drained, vec!["a".to_string(), "b".to_string()]);
    assert!(bus.drain().is_empty());
}

#[test]
fn cancel_removes_a_single_intent() {
    let bus = RetriggerBus::default();
    bus.record("a");
    bus.record("b");
    bus.cancel("a");
    assert_eq!(bus.drain(), vec!["b".to_string()]);
}

#[test]
fn cancel_of_unknown_is_a_noop() {
    let bus = RetriggerBus::default();
    bus.cancel("ghost");
    assert!(!bus.is_pending());
}
