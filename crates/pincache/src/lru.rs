//! LRU cache with pinning and merge support
//!
//! Unpinned entries sit on a recency chain and are evicted from its tail
//! once the total entry count exceeds capacity. Pinned entries sit on a
//! separate chain that the eviction pass never touches, so a cache whose
//! pinned entries alone exceed capacity simply stays over capacity.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use ahash::RandomState;
use tracing::{debug, trace};

use crate::arena::{NodeArena, Region, SlotId};
use crate::error::{Error, Result};

/// Upper bound on slots reserved up front by [`PinnedLru::new`]
const MAX_PREALLOC: usize = 1 << 16;

/// Result of [`PinnedLru::put`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// A new unpinned entry was created at the head of the recency list
    Inserted,
    /// The key already existed; its value was replaced and recency refreshed
    UpdatedExisting,
    /// Pinned entries already fill the capacity, so no new entry fits
    RejectedPinnedFull,
}

impl PutOutcome {
    /// True for [`PutOutcome::Inserted`]
    pub fn is_inserted(self) -> bool {
        self == PutOutcome::Inserted
    }

    /// True for [`PutOutcome::RejectedPinnedFull`]
    pub fn is_rejected(self) -> bool {
        self == PutOutcome::RejectedPinnedFull
    }
}

/// Capacity-bounded LRU cache whose entries can be pinned against eviction
///
/// Capacity bounds the total entry count. Eviction only ever removes
/// unpinned entries, least recently used first.
#[derive(Clone)]
pub struct PinnedLru<K, V> {
    map: HashMap<K, SlotId, RandomState>,
    nodes: NodeArena<K, V>,
    capacity: usize,
    evictions: u64,
}

impl<K, V> fmt::Debug for PinnedLru<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedLru")
            .field("len", &self.nodes.len())
            .field("pinned", &self.nodes.chain(Region::Pinned).len)
            .field("capacity", &self.capacity)
            .field("evictions", &self.evictions)
            .finish()
    }
}

impl<K, V> PinnedLru<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new cache with the given capacity
    ///
    /// A capacity of zero is allowed: every insert of a new key is rejected.
    pub fn new(capacity: usize) -> Self {
        let prealloc = capacity.min(MAX_PREALLOC);

        Self {
            map: HashMap::with_capacity_and_hasher(prealloc, RandomState::new()),
            nodes: NodeArena::with_capacity(prealloc),
            capacity,
            evictions: 0,
        }
    }

    /// Fixed capacity set at construction
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of live entries, pinned and unpinned
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pinned entries
    pub fn pinned_len(&self) -> usize {
        self.nodes.chain(Region::Pinned).len
    }

    /// Number of unpinned entries
    pub fn unpinned_len(&self) -> usize {
        self.nodes.chain(Region::Recency).len
    }

    /// Entries removed by eviction passes since construction
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Get a copy of the value for `key`
    ///
    /// An unpinned entry becomes the most recently used one. Pinned entries
    /// keep their position.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.map.get(key)?;
        self.touch(id);
        self.nodes.get(id).map(|node| node.value.clone())
    }

    /// Look at a value without refreshing its recency
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.map.get(key)?;
        self.nodes.get(id).map(|node| &node.value)
    }

    /// Check whether `key` is present, without touching recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Check whether `key` is present and pinned
    pub fn is_pinned<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.region_of(key) == Some(Region::Pinned)
    }

    /// Insert or update a key-value pair
    pub fn put(&mut self, key: K, value: V) -> PutOutcome {
        if let Some(&id) = self.map.get(&key) {
            self.touch(id);
            if let Some(node) = self.nodes.get_mut(id) {
                node.value = value;
            }
            return PutOutcome::UpdatedExisting;
        }

        if self.pinned_len() >= self.capacity {
            debug!(
                pinned = self.pinned_len(),
                capacity = self.capacity,
                "insert rejected, pinned entries fill capacity"
            );
            return PutOutcome::RejectedPinnedFull;
        }

        let id = self.nodes.push_front(Region::Recency, key.clone(), value);
        self.map.insert(key, id);
        self.evict();

        PutOutcome::Inserted
    }

    /// Remove `key` whether pinned or not
    ///
    /// Returns false if the key was absent.
    pub fn erase<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.map.remove(key) {
            Some(id) => {
                self.nodes.remove(id);
                true
            }
            None => false,
        }
    }

    /// Exempt `key` from eviction
    ///
    /// Returns false if the key is absent or already pinned.
    pub fn pin<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = match self.map.get(key) {
            Some(&id) => id,
            None => return false,
        };
        if self.nodes.get(id).map(|node| node.region) != Some(Region::Recency) {
            return false;
        }

        self.nodes.move_to_back(id, Region::Pinned);
        true
    }

    /// Return a pinned entry to the recency list as most recently used
    ///
    /// Returns false if the key is absent or not pinned. Runs an eviction
    /// pass, which may evict other entries.
    pub fn unpin<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = match self.map.get(key) {
            Some(&id) => id,
            None => return false,
        };
        if self.nodes.get(id).map(|node| node.region) != Some(Region::Pinned) {
            return false;
        }

        self.nodes.move_to_front(id, Region::Recency);
        self.evict();
        true
    }

    /// Copy every entry of `other` whose key is absent here
    ///
    /// Pinned donors stay pinned and unpinned donors land at the head of
    /// the recency list, both keeping their relative order from `other`.
    /// Keys already present here keep their value and position. One
    /// eviction pass runs at the end.
    pub fn merge(&mut self, other: &Self) {
        let mut pinned = 0usize;
        let mut unpinned = 0usize;

        for (_, node) in other.nodes.iter(Region::Pinned).rev() {
            if self.map.contains_key(&node.key) {
                continue;
            }
            let id = self
                .nodes
                .push_front(Region::Pinned, node.key.clone(), node.value.clone());
            self.map.insert(node.key.clone(), id);
            pinned += 1;
        }

        for (_, node) in other.nodes.iter(Region::Recency).rev() {
            if self.map.contains_key(&node.key) {
                continue;
            }
            let id = self
                .nodes
                .push_front(Region::Recency, node.key.clone(), node.value.clone());
            self.map.insert(node.key.clone(), id);
            unpinned += 1;
        }

        let evicted = self.evict();
        debug!(pinned, unpinned, evicted, len = self.len(), "merge complete");
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
    }

    /// Unpinned keys, most recently used first
    pub fn recent_keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.nodes.iter(Region::Recency).map(|(_, node)| &node.key)
    }

    /// Pinned keys, oldest pin first
    pub fn pinned_keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.nodes.iter(Region::Pinned).map(|(_, node)| &node.key)
    }

    /// Verify that the index and both chains agree
    pub fn check_invariants(&self) -> Result<()> {
        let mut walked = 0usize;

        for region in [Region::Recency, Region::Pinned] {
            let chain = self.nodes.chain(region);
            let mut prev: Option<SlotId> = None;
            let mut count = 0usize;

            for (id, node) in self.nodes.iter(region) {
                count += 1;
                if node.region != region {
                    return Err(Error::invariant(format!(
                        "slot {} linked in {:?} chain is tagged {:?}",
                        id.index(),
                        region,
                        node.region
                    )));
                }
                if node.prev != prev {
                    return Err(Error::invariant(format!(
                        "slot {} in {:?} chain has inconsistent prev link",
                        id.index(),
                        region
                    )));
                }
                if self.map.get(&node.key) != Some(&id) {
                    return Err(Error::invariant(format!(
                        "slot {} in {:?} chain is not the indexed slot for its key",
                        id.index(),
                        region
                    )));
                }
                prev = Some(id);
            }

            if count != chain.len {
                return Err(Error::invariant(format!(
                    "{:?} chain walk found {} nodes, expected {}",
                    region, count, chain.len
                )));
            }
            if chain.tail != prev {
                return Err(Error::invariant(format!(
                    "{:?} chain tail does not match last walked node",
                    region
                )));
            }
            if let Some(tail) = chain.tail.and_then(|id| self.nodes.get(id)) {
                if tail.next.is_some() {
                    return Err(Error::invariant(format!(
                        "{:?} chain continues past its tail",
                        region
                    )));
                }
            }
            walked += count;
        }

        if self.map.len() != walked {
            return Err(Error::invariant(format!(
                "index holds {} keys but chains hold {} entries",
                self.map.len(),
                walked
            )));
        }

        if self.len() > self.capacity && self.unpinned_len() > 0 {
            return Err(Error::invariant(format!(
                "{} entries exceed capacity {} while {} unpinned remain",
                self.len(),
                self.capacity,
                self.unpinned_len()
            )));
        }

        Ok(())
    }

    fn region_of<Q>(&self, key: &Q) -> Option<Region>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.map.get(key)?;
        self.nodes.get(id).map(|node| node.region)
    }

    fn touch(&mut self, id: SlotId) {
        if self.nodes.get(id).map(|node| node.region) == Some(Region::Recency) {
            self.nodes.move_to_front(id, Region::Recency);
        }
    }

    /// Drop least recently used unpinned entries until within capacity
    fn evict(&mut self) -> usize {
        let mut evicted = 0usize;

        while self.nodes.len() > self.capacity {
            let Some(tail) = self.nodes.chain(Region::Recency).tail else {
                break;
            };
            match self.nodes.remove(tail) {
                Some(node) => {
                    self.map.remove(&node.key);
                    evicted += 1;
                    trace!(slot = tail.index(), "evicted least recently used entry");
                }
                None => break,
            }
        }

        self.evictions += evicted as u64;
        evicted
    }
}
