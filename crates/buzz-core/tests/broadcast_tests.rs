// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Live delivery of hub events to observers.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use buzz_core::{BroadcastHub, MemoryRecordStore, OrderingEngine};
use buzz_proto::HubEvent;
use tokio::time::{timeout, Duration};

#[tokio::test]
async fn early_subscriber_gets_exactly_one_event_late_one_gets_none() {
    let engine = OrderingEngine::in_memory();
    let mut early = engine.hub().subscribe();

    let record = engine.submit("Alpha", 1000).unwrap();

    let got = timeout(Duration::from_secs(1), early.recv())
        .await
        .ok()
        .flatten()
        .expect("new-buzz for early subscriber");
    assert_eq!(got, HubEvent::NewBuzz(record.clone()));
    assert_eq!(early.try_recv(), None);

    let mut late = engine.hub().subscribe();
    assert_eq!(late.try_recv(), None);

    // a late observer reconciles through the snapshot read
    assert_eq!(engine.snapshot().unwrap(), HubEvent::Snapshot(vec![record]));
}

#[tokio::test]
async fn per_subscriber_delivery_follows_publish_order() {
    let engine = OrderingEngine::in_memory();
    let mut sub = engine.hub().subscribe();

    let a = engine.submit("A", 300).unwrap();
    let b = engine.submit("B", 100).unwrap();
    let c = engine.submit("C", 200).unwrap();

    for expected in [a, b, c] {
        assert_eq!(sub.recv().await, Some(HubEvent::NewBuzz(expected)));
    }
}

#[tokio::test]
async fn stalled_observer_does_not_block_writes_or_other_observers() {
    let engine = OrderingEngine::new(Arc::new(MemoryRecordStore::new()), BroadcastHub::new(2));
    let mut stalled = engine.hub().subscribe();
    let mut live = engine.hub().subscribe();

    for ts in 0..10 {
        engine.submit("t", ts).unwrap();
        assert!(matches!(live.recv().await, Some(HubEvent::NewBuzz(r)) if r.timestamp == ts));
    }
    assert_eq!(engine.count().unwrap(), 10);

    // the stalled observer keeps its first two events, then is told to resync
    assert!(matches!(stalled.recv().await, Some(HubEvent::NewBuzz(r)) if r.timestamp == 0));
    assert!(matches!(stalled.recv().await, Some(HubEvent::NewBuzz(r)) if r.timestamp == 1));
    assert_eq!(stalled.recv().await, Some(HubEvent::Resync));
    assert_eq!(stalled.try_recv(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishers_reach_every_subscriber() {
    let engine = Arc::new(OrderingEngine::in_memory());
    let mut subs: Vec<_> = (0..3).map(|_| engine.hub().subscribe()).collect();

    let mut tasks = Vec::new();
    for ts in 0..20 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move { engine.submit("t", ts) }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    for sub in &mut subs {
        let mut seen = Vec::new();
        while let Some(HubEvent::NewBuzz(r)) = sub.try_recv() {
            seen.push(r.timestamp);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }
}
