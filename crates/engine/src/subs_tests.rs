// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mw_core::StateNotification;
use serde_json::json;

fn state_note(source: &str, key: &str, cycle: u64) -> Notification {
    Notification::State(StateNotification {
        source: source.to_string(),
        key: key.to_string(),
        value: json!(cycle),
        cycle,
    })
}

#[test]
fn inbox_is_fifo() {
    let hub = SubscriptionHub::new(8);
    let inbox = hub.register_want("w");
    inbox.push(state_note("a", "k", 1));
    inbox.push(state_note("a", "k", 2));
    let drained = inbox.drain();
    assert_eq!(drained.len(), 2);
    match (&drained[0], &drained[1]) {
        (Notification::State(first), Notification::State(second)) => {
            assert_eq!(first.cycle, 1);
            assert_eq!(second.cycle, 2);
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn full_inbox_drops_oldest() {
    let hub = SubscriptionHub::new(2);
    let inbox = hub.register_want("w");
    inbox.push(state_note("a", "k", 1));
    inbox.push(state_note("a", "k", 2));
    inbox.push(state_note("a", "k", 3));

    assert_eq!(inbox.dropped(), 1);
    let drained = inbox.drain();
    assert_eq!(drained.len(), 2);
    match &drained[0] {
        Notification::State(n) => assert_eq!(n.cycle, 2),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn deliver_routes_to_registered_want() {
    let hub = SubscriptionHub::new(8);
    let inbox = hub.register_want("w");
    assert!(hub.deliver("w", state_note("a", "k", 1)));
    assert_eq!(inbox.len(), 1);
    assert!(!hub.deliver("nobody", state_note("a", "k", 1)));
}

#[test]
fn removed_want_no_longer_receives() {
    let hub = SubscriptionHub::new(8);
    let _inbox = hub.register_want("w");
    hub.remove_want("w");
    assert!(!hub.deliver("w", state_note("a", "k", 1)));
}

#[test]
fn broadcast_reaches_every_watcher() {
    let hub = SubscriptionHub::new(8);
    let w1 = hub.watch();
    let w2 = hub.watch();
    hub.broadcast(&state_note("a", "k", 1));
    assert_eq!(w1.drain().len(), 1);
    assert_eq!(w2.drain().len(), 1);
}

#[test]
fn unwatch_stops_delivery() {
    let hub = SubscriptionHub::new(8);
    let watcher = hub.watch();
    assert!(hub.unwatch(watcher.id));
    hub.broadcast(&state_note("a", "k", 1));
    assert!(watcher.drain().is_empty());
    assert!(!hub.unwatch(watcher.id));
}

#[tokio::test]
async fn recv_wakes_on_push() {
    let hub = SubscriptionHub::new(8);
    let inbox = hub.register_want("w");
    let waiter = {
        let inbox = std::sync::Arc::clone(&inbox);
        tokio::spawn(async move { inbox.recv().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    inbox.push(state_note("a", "k", 9));
    let got = waiter.await.unwrap();
    match got {
        Notification::State(n) => assert_eq!(n.cycle, 9),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn per_source_key_order_is_preserved() {
    let hub = SubscriptionHub::new(16);
    let inbox = hub.register_want("w");
    for cycle in 1..=5 {
        inbox.push(state_note("src", "count", cycle));
    }
    let cycles: Vec<u64> = inbox
        .drain()
        .into_iter()
        .map(|n| match n {
            Notification::State(n) => n.cycle,
            other => panic!("unexpected: {:?}", other),
        })
        .collect();
    assert_eq!(cycles, vec![1, 2, 3, 4, 5]);
}
