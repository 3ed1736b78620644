// Copyright (c) 2020, KTH Royal Institute of Technology.
// SPDX-License-Identifier: AGPL-3.0-only

#[cfg(feature = "hasher")]
use std::hash::Hash;

/// Alias type for Hasher used to stripe keys in tally
///
/// tally uses MurmurHash3
#[cfg(feature = "hasher")]
pub type KeyHasher = mur3::Hasher32;

/// Helper function to create [KeyHasher]
#[cfg(feature = "hasher")]
#[inline]
pub fn key_hasher() -> KeyHasher {
    KeyHasher::with_seed(0)
}

/// Hashes a key into a stable 32-bit value
#[cfg(feature = "hasher")]
#[inline]
pub fn hash_key<K>(key: &K) -> u32
where
    K: Hash + ?Sized,
{
    let mut hasher = key_hasher();
    key.hash(&mut hasher);
    hasher.finish32()
}

/// Maps a key to one of `stripes` lock stripes
///
/// The same key always lands on the same stripe for a fixed stripe count.
#[cfg(feature = "hasher")]
#[inline]
pub fn stripe_of<K>(key: &K, stripes: usize) -> usize
where
    K: Hash + ?Sized,
{
    assert!(stripes > 0, "stripe count must be positive");
    hash_key(key) as usize % stripes
}
