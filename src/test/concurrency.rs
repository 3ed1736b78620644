// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use super::test_store;
use crate::prelude::*;
use crossbeam_utils::thread;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[test]
fn parallel_increments_are_not_lost() {
    let store = test_store(10_000, 4);
    let window = store.assigner().assign(0);

    thread::scope(|s| {
        for _ in 0..100 {
            s.spawn(|_| {
                store.increment("x", window).unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(store.get("x", 0).unwrap().count, 100);
}

#[test]
fn keys_on_different_shards_progress_independently() {
    let store = test_store(1_000, 8);
    let workers = 8;
    let per_worker = 1_000;

    thread::scope(|s| {
        for w in 0..workers {
            let store = &store;
            s.spawn(move |_| {
                let key = format!("key-{}", w);
                for i in 0..per_worker {
                    let window = store.assigner().assign(i * 10);
                    store.increment(&key, window).unwrap();
                }
            });
        }
    })
    .unwrap();

    let stats = store.stats();
    assert_eq!(stats.keys, workers as usize);
    // timestamps 0..10_000 cover ten one-second windows per key
    assert_eq!(stats.windows, workers as usize * 10);
    for w in 0..workers {
        let counts = store.range_fetch(&format!("key-{}", w), 0, 10_000).unwrap();
        assert_eq!(counts.len(), 10);
        assert!(counts.iter().all(|wc| wc.count == 100));
    }
}

#[test]
fn readers_never_see_partial_eviction() {
    let store = test_store(10, 2);
    for start in (0..1_000).step_by(10) {
        store.increment("k", store.assigner().assign(start)).unwrap();
    }
    let done = Arc::new(AtomicBool::new(false));

    thread::scope(|s| {
        let reader_done = done.clone();
        let store = &store;
        s.spawn(move |_| {
            while !reader_done.load(Ordering::Relaxed) {
                let counts = store.range_fetch("k", 0, 1_000).unwrap();
                // eviction only ever removes a prefix of the key's windows
                if let Some(first) = counts.first() {
                    let first = first.window.start();
                    assert_eq!(counts.len() as u64, (1_000 - first) / 10);
                    assert!(counts
                        .windows(2)
                        .all(|pair| pair[0].window.start() + 10 == pair[1].window.start()));
                }
            }
        });

        for now in (0..=1_100).step_by(20) {
            store.evict_expired(now, 0);
        }
        done.store(true, Ordering::Relaxed);
    })
    .unwrap();

    // horizon 1100: every window ends at or before 1000
    assert!(store.range_fetch("k", 0, 1_000).unwrap().is_empty());
    assert!(store.is_empty());
    assert_eq!(store.stats().evicted, 100);
}

#[test]
fn concurrent_ingestion_through_pipeline() {
    let store = test_store(10_000, 4);
    let clock = Arc::new(ManualClock::new(0));
    let pipeline = IngestionPipeline::new(
        store.clone(),
        clock,
        TallyTime::Event,
        &super::test_logger(),
    );

    thread::scope(|s| {
        for t in 0..4u64 {
            let pipeline = pipeline.clone();
            s.spawn(move |_| {
                let events = (0..250).map(|i| Event::new("hot", t * 250 + i));
                let report = pipeline.submit_batch(events);
                assert_eq!(report.accepted, 250);
            });
        }
    })
    .unwrap();

    let query = QueryService::new(store);
    assert_eq!(query.counts_in_range("hot", 0, 10_000).unwrap(), vec![(0, 1_000)]);
}
