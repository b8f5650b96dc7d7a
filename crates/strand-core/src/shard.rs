//! Sharded maps keyed by actor or intent id.
//!
//! Operations on one key lock exactly one shard. Operations that span many
//! keys lock every shard they touch in ascending shard index, which is the
//! only order any caller ever acquires more than one shard in.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use parking_lot::{Mutex, MutexGuard};

/// Default number of shards.
pub const DEFAULT_SHARD_COUNT: usize = 64;

/// Hash map split across independently locked shards.
pub struct ShardedMap<K, V> {
    shards: Vec<Mutex<HashMap<K, V>>>,
    hasher: RandomState,
}

impl<K: Hash + Eq, V> ShardedMap<K, V> {
    /// Creates a map with `shard_count` shards (at least one).
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard that owns `key`.
    pub fn shard_index(&self, key: &K) -> usize {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Locks the shard owning `key`.
    pub fn lock(&self, key: &K) -> MutexGuard<'_, HashMap<K, V>> {
        self.shards[self.shard_index(key)].lock()
    }

    /// Locks every shard owning one of `keys`, in ascending shard order.
    pub fn lock_many<'k, I>(&self, keys: I) -> ShardSet<'_, K, V>
    where
        I: IntoIterator<Item = &'k K>,
        K: 'k,
    {
        let indices: BTreeSet<usize> = keys.into_iter().map(|k| self.shard_index(k)).collect();
        let guards = indices
            .into_iter()
            .map(|idx| (idx, self.shards[idx].lock()))
            .collect();
        ShardSet { map: self, guards }
    }

    /// Total entries. Shards are visited one at a time, so the result is
    /// only a snapshot under concurrent writes.
    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }
}

/// A set of locked shards held for a multi-key operation.
pub struct ShardSet<'a, K, V> {
    map: &'a ShardedMap<K, V>,
    guards: BTreeMap<usize, MutexGuard<'a, HashMap<K, V>>>,
}

impl<K: Hash + Eq, V> ShardSet<'_, K, V> {
    /// Looks up `key`; `None` when absent or when its shard is not held.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.guards.get(&self.map.shard_index(key))?.get(key)
    }

    /// Mutable lookup; `None` when absent or when its shard is not held.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.map.shard_index(key);
        self.guards.get_mut(&idx)?.get_mut(key)
    }
}
