// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

/// Background eviction job
pub mod eviction;
mod shard;

pub use eviction::Evictor;

use self::shard::{create_shards, shard_lookup, Shard, WindowCounts};
use crate::{
    error::{InvalidRange, TallyResult, WindowMismatch},
    sink::EmissionSink,
    time::Timestamp,
    window::{Window, WindowAssigner, WindowCount},
};
use crossbeam_utils::CachePadded;
use snafu::ensure;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Point-in-time figures of an [AggregationStore]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Keys with at least one live window
    pub keys: usize,
    /// Live (key, window) entries
    pub windows: usize,
    /// Entries removed by eviction since the store was created
    pub evicted: u64,
}

/// In-memory windowed key -> count store
///
/// State is kept per (key, window) rather than per event, so memory is bound
/// by distinct keys times live windows. Keys are striped over a fixed set of
/// shards; operations on one key are serialized by its shard lock while
/// operations on keys in other shards never contend.
pub struct AggregationStore {
    assigner: WindowAssigner,
    shards: Vec<CachePadded<Shard>>,
    sink: Arc<dyn EmissionSink>,
    evicted: AtomicU64,
}

impl AggregationStore {
    /// Creates an empty store
    ///
    /// The window length of `assigner` is fixed for the store's lifetime.
    pub fn new(assigner: WindowAssigner, shard_count: usize, sink: Arc<dyn EmissionSink>) -> Self {
        AggregationStore {
            assigner,
            shards: create_shards(shard_count),
            sink,
            evicted: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn assigner(&self) -> WindowAssigner {
        self.assigner
    }

    #[inline]
    fn shard(&self, key: &str) -> &Shard {
        &self.shards[shard_lookup(key, self.shards.len())]
    }

    /// Adds one to the count of `key` in `window`
    ///
    /// The entry is created on first use. The post-increment aggregate is
    /// handed to the emission sink once the shard lock is released.
    pub fn increment(&self, key: &str, window: Window) -> TallyResult<WindowCount> {
        ensure!(
            self.assigner.owns(&window),
            WindowMismatch {
                expected: self.assigner.length(),
                actual: window.length(),
            }
        );

        let start = window.start();
        let count = {
            let mut entries = self.shard(key).lock();
            match entries.get_mut(key) {
                Some(windows) => {
                    let count = windows.entry(start).or_insert(0);
                    *count = count.saturating_add(1);
                    *count
                }
                None => {
                    let mut windows = WindowCounts::new();
                    windows.insert(start, 1);
                    entries.insert(key.to_owned(), windows);
                    1
                }
            }
        };

        let update = WindowCount::new(key, window, count);
        self.sink.on_update(&update);
        Ok(update)
    }

    /// Returns the count of `key` in the window containing `window_start`
    ///
    /// A window without observed events is `None`, not an error.
    pub fn get(&self, key: &str, window_start: Timestamp) -> Option<WindowCount> {
        let window = self.assigner.window_at(window_start);
        let entries = self.shard(key).lock();
        entries
            .get(key)
            .and_then(|windows| windows.get(&window.start()))
            .map(|count| WindowCount::new(key, window, *count))
    }

    /// Returns all windows of `key` with `from <= start < to`, ascending by start
    ///
    /// The whole scan runs under the key's shard lock, so it never observes a
    /// partially evicted range.
    pub fn range_fetch(
        &self,
        key: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> TallyResult<Vec<WindowCount>> {
        ensure!(from <= to, InvalidRange { from, to });

        let entries = self.shard(key).lock();
        let result = match entries.get(key) {
            Some(windows) => windows
                .range(from..to)
                .map(|(start, count)| WindowCount::new(key, self.assigner.window_at(*start), *count))
                .collect(),
            None => Vec::new(),
        };
        Ok(result)
    }

    /// Removes every window whose end lies before `now - retention`
    ///
    /// Windows ending at or after that horizon are kept. Returns the amount of
    /// removed entries. Shards are swept one at a time.
    pub fn evict_expired(&self, now: Timestamp, retention: u64) -> usize {
        let horizon = now.saturating_sub(retention);
        // end < horizon <=> start < horizon - length
        let cutoff = horizon.saturating_sub(self.assigner.length());
        if cutoff == 0 {
            return 0;
        }

        let mut removed = 0;
        for shard in &self.shards {
            let mut entries = shard.lock();
            entries.retain(|_, windows| {
                let kept = windows.split_off(&cutoff);
                removed += windows.len();
                *windows = kept;
                !windows.is_empty()
            });
        }

        self.evicted.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Keys currently tracked, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .shards
            .iter()
            .flat_map(|shard| shard.lock().keys().cloned().collect::<Vec<_>>())
            .collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            evicted: self.evicted.load(Ordering::Relaxed),
            ..Default::default()
        };
        for shard in &self.shards {
            let entries = shard.lock();
            stats.keys += entries.len();
            stats.windows += entries.values().map(|w| w.len()).sum::<usize>();
        }
        stats
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.lock().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{debug::DebugSink, NoopSink};

    fn store(length: u64) -> AggregationStore {
        AggregationStore::new(
            WindowAssigner::tumbling(length).unwrap(),
            4,
            Arc::new(NoopSink),
        )
    }

    #[test]
    fn increment_creates_then_updates() {
        let store = store(10_000);
        let w = store.assigner().assign(1_000);
        assert_eq!(store.increment("hello", w).unwrap().count, 1);
        assert_eq!(store.increment("hello", w).unwrap().count, 2);
        let other = store.assigner().assign(11_000);
        assert_eq!(store.increment("hello", other).unwrap().count, 1);

        assert_eq!(store.get("hello", 0).unwrap().count, 2);
        assert_eq!(store.get("hello", 10_000).unwrap().count, 1);
        assert_eq!(store.get("hello", 10_000).unwrap().window, other);
    }

    #[test]
    fn get_absent_is_none() {
        let store = store(10_000);
        assert!(store.get("nope", 0).is_none());
        store.increment("k", store.assigner().assign(0)).unwrap();
        assert!(store.get("k", 10_000).is_none());
    }

    #[test]
    fn foreign_window_is_rejected() {
        let store = store(10_000);
        let foreign = WindowAssigner::tumbling(5_000).unwrap().assign(5_000);
        match store.increment("k", foreign) {
            Err(crate::error::Error::WindowMismatch { expected, actual }) => {
                assert_eq!(expected, 10_000);
                assert_eq!(actual, 5_000);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn range_fetch_is_ordered_and_half_open() {
        let store = store(10);
        for ts in &[55, 5, 35, 15, 25, 45] {
            store.increment("k", store.assigner().assign(*ts)).unwrap();
        }

        let starts: Vec<u64> = store
            .range_fetch("k", 10, 40)
            .unwrap()
            .iter()
            .map(|wc| wc.window.start())
            .collect();
        assert_eq!(starts, vec![10, 20, 30]);

        let all = store.range_fetch("k", 0, u64::MAX).unwrap();
        assert!(all.windows(2).all(|p| p[0].window.start() < p[1].window.start()));
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn range_fetch_edge_cases() {
        let store = store(10);
        assert!(store.range_fetch("unseen", 0, 100).unwrap().is_empty());
        store.increment("k", store.assigner().assign(0)).unwrap();
        assert!(store.range_fetch("k", 0, 0).unwrap().is_empty());
        assert!(store.range_fetch("k", 100, 200).unwrap().is_empty());
        assert!(matches!(
            store.range_fetch("k", 20, 10),
            Err(crate::error::Error::InvalidRange { from: 20, to: 10 })
        ));
    }

    #[test]
    fn eviction_respects_horizon() {
        let store = store(10);
        for ts in &[0, 10, 20, 30] {
            store.increment("a", store.assigner().assign(*ts)).unwrap();
        }
        store.increment("b", store.assigner().assign(0)).unwrap();

        // horizon = 50 - 20 = 30: ends 10 and 20 go, end 30 stays
        let removed = store.evict_expired(50, 20);
        assert_eq!(removed, 3);
        assert!(store.get("a", 0).is_none());
        assert!(store.get("a", 10).is_none());
        assert_eq!(store.get("a", 20).unwrap().count, 1);
        assert_eq!(store.get("a", 30).unwrap().count, 1);
        // key without live windows is gone
        assert!(store.get("b", 0).is_none());
        assert_eq!(store.keys(), vec!["a".to_string()]);

        // idempotent
        assert_eq!(store.evict_expired(50, 20), 0);
        assert_eq!(
            store.stats(),
            StoreStats {
                keys: 1,
                windows: 2,
                evicted: 3
            }
        );
    }

    #[test]
    fn eviction_before_retention_elapsed_is_noop() {
        let store = store(10);
        store.increment("a", store.assigner().assign(0)).unwrap();
        assert_eq!(store.evict_expired(5, 100), 0);
        assert_eq!(store.evict_expired(10, 0), 0);
        assert_eq!(store.evict_expired(11, 0), 1);
    }

    #[test]
    fn sink_sees_every_increment() {
        let sink = Arc::new(DebugSink::new());
        let store = AggregationStore::new(WindowAssigner::tumbling(10).unwrap(), 2, sink.clone());
        let w = store.assigner().assign(3);
        store.increment("x", w).unwrap();
        store.increment("x", w).unwrap();
        let counts: Vec<u64> = sink.updates().iter().map(|u| u.count).collect();
        assert_eq!(counts, vec![1, 2]);
        assert_eq!(sink.updates()[1].window, w);
    }
}
