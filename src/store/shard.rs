// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

use crate::time::Timestamp;
use crossbeam_utils::CachePadded;
use fxhash::FxHashMap;
use std::{
    collections::BTreeMap,
    hash::Hash,
    sync::{Mutex, MutexGuard},
};

/// Counts of a single key ordered by window start
pub(crate) type WindowCounts = BTreeMap<Timestamp, u64>;

/// Keys owned by one lock stripe
///
/// FxHash as most keys tend to be small
pub(crate) type ShardEntries = FxHashMap<String, WindowCounts>;

/// A lock stripe of the store
///
/// Every read, write and eviction touching a key holds the lock of the key's
/// shard for its full duration.
#[derive(Debug, Default)]
pub(crate) struct Shard {
    entries: Mutex<ShardEntries>,
}

impl Shard {
    /// Locks the shard
    ///
    /// A panic while holding the lock cannot leave an entry half written, so
    /// a poisoned lock is taken over as is.
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, ShardEntries> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub(crate) fn create_shards(total: usize) -> Vec<CachePadded<Shard>> {
    assert!(total > 0, "Attempted to create a store without shards");
    (0..total)
        .map(|_| CachePadded::new(Shard::default()))
        .collect()
}

// Maps a key to the shard responsible for it
#[inline]
pub(crate) fn shard_lookup<K>(key: &K, total_shards: usize) -> usize
where
    K: Hash + ?Sized,
{
    tally_util::stripe_of(key, total_shards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_test() {
        let shards = create_shards(4);
        assert_eq!(shards.len(), 4);
        for key in &["a", "b", "hello", "world"] {
            let idx = shard_lookup(*key, shards.len());
            assert!(idx < 4);
            assert_eq!(idx, shard_lookup(*key, shards.len()));
        }
    }

    #[test]
    fn shard_lock_is_exclusive_per_shard() {
        let shards = create_shards(2);
        let mut first = shards[0].lock();
        first.entry("k".into()).or_default().insert(0, 1);
        // a different stripe is independent
        assert!(shards[1].lock().is_empty());
        drop(first);
        assert_eq!(shards[0].lock()["k"][&0], 1);
    }
}
