//! LRU (Least Recently Used) cache implementation
//!
//! Entries live in a slot arena and the recency list is threaded through it by
//! index, so neighbour links never own anything. `head` is the least recently
//! used end, `tail` the most recently used one.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;

use ahash::RandomState;
use tracing::debug;

use crate::error::{Error, Result};
use crate::stats::CacheStats;

/// Upper bound on slots reserved up front; larger caches grow on demand.
const MAX_PREALLOC: usize = 4096;

/// Node in the LRU doubly-linked list
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A non-promoting view of one entry and its neighbours in recency order
#[derive(Debug, PartialEq, Eq)]
pub struct EntryDetail<'a, K, V> {
    /// The entry's key
    pub key: &'a K,
    /// The entry's value
    pub value: &'a V,
    /// Key of the next older entry, absent for the LRU entry
    pub previous: Option<&'a K>,
    /// Key of the next newer entry, absent for the MRU entry
    pub next: Option<&'a K>,
}

/// LRU cache with fixed capacity
///
/// Every `set` and every promoting lookup moves the entry to the MRU end.
/// Inserting a new key into a full cache evicts the LRU entry after the new
/// one is linked, so the entry just inserted is never the victim.
pub struct LruCache<K, V, S = RandomState> {
    map: HashMap<K, usize, S>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
    capacity: usize,
    stats: CacheStats,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new LRU cache with the given capacity
    ///
    /// Fails with [`Error::InvalidConfiguration`] when `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S> LruCache<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    /// Create a new LRU cache that hashes keys with `hash_builder`
    pub fn with_hasher(capacity: usize, hash_builder: S) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfiguration(
                "capacity must be greater than 0".to_string(),
            ));
        }

        let reserve = capacity.min(MAX_PREALLOC);
        Ok(Self {
            map: HashMap::with_capacity_and_hasher(reserve, hash_builder),
            // One spare slot: a new entry is linked before the victim leaves.
            nodes: Vec::with_capacity(reserve + 1),
            head: None,
            tail: None,
            free_list: Vec::new(),
            capacity,
            stats: CacheStats::new(),
        })
    }

    /// Get a value from the cache, marking it most recently used
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_with(key, true)
    }

    /// Get a value, promoting it only when `promote` is true
    ///
    /// `get_with(key, false)` behaves exactly like [`peek`](Self::peek).
    pub fn get_with<Q>(&mut self, key: &Q, promote: bool) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !promote {
            return self.peek(key);
        }

        let idx = match self.map.get(key) {
            Some(&idx) => idx,
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        self.stats.record_hit();
        self.move_to_tail(idx);
        self.node(idx).map(|node| &node.value)
    }

    /// Get a mutable reference to a value, marking it most recently used
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = match self.map.get(key) {
            Some(&idx) => idx,
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        self.stats.record_hit();
        self.move_to_tail(idx);
        self.node_mut(idx).map(|node| &mut node.value)
    }

    /// Get a value without touching recency order or statistics
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &idx = self.map.get(key)?;
        self.node(idx).map(|node| &node.value)
    }

    /// Inspect an entry together with its neighbours, without promoting it
    pub fn detail<Q>(&self, key: &Q) -> Option<EntryDetail<'_, K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &idx = self.map.get(key)?;
        let node = self.node(idx)?;

        Some(EntryDetail {
            key: &node.key,
            value: &node.value,
            previous: node.prev.and_then(|p| self.node(p)).map(|n| &n.key),
            next: node.next.and_then(|n| self.node(n)).map(|n| &n.key),
        })
    }

    /// Check whether a key is cached, without promoting it
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Insert or update a key-value pair, marking it most recently used
    ///
    /// Returns the entry evicted to make room, if any. Updating an existing
    /// key never evicts.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.map.get(&key) {
            if let Some(node) = self.node_mut(idx) {
                node.value = value;
            }
            self.move_to_tail(idx);
            self.stats.record_update();
            return None;
        }

        let idx = self.alloc_node(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.link_tail(idx);
        self.map.insert(key, idx);
        self.stats.record_insert();

        if self.map.len() > self.capacity {
            self.evict()
        } else {
            None
        }
    }

    /// Remove a key from the cache, returning its value
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        let node = self.release_node(idx)?;
        debug!(slot = idx, len = self.map.len(), "removed cache entry");
        Some(node.value)
    }

    /// Remove a key from the cache, reporting whether it was present
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove(key).is_some()
    }

    /// Evict the least recently used entry and return it
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        self.evict()
    }

    fn evict(&mut self) -> Option<(K, V)> {
        let idx = self.head?;
        self.unlink(idx);
        let node = self.release_node(idx)?;
        self.map.remove(&node.key);
        self.stats.record_eviction();
        debug!(
            slot = idx,
            len = self.map.len(),
            capacity = self.capacity,
            "evicted least recently used entry"
        );
        Some((node.key, node.value))
    }

    /// Validate the index/list invariants, panicking on the first violation
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let count = self.map.len();
        assert!(
            count <= self.capacity,
            "len({}) > capacity({})",
            count,
            self.capacity
        );

        let occupied = self.nodes.iter().filter(|slot| slot.is_some()).count();
        assert_eq!(occupied, count, "occupied slots != index size");

        let mut freed = vec![false; self.nodes.len()];
        for &idx in &self.free_list {
            assert!(self.nodes[idx].is_none(), "free slot {} is occupied", idx);
            assert!(!freed[idx], "slot {} freed twice", idx);
            freed[idx] = true;
        }
        assert_eq!(
            occupied + self.free_list.len(),
            self.nodes.len(),
            "slots leaked from the arena"
        );

        let mut visited = 0;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = self.nodes[idx]
                .as_ref()
                .expect("recency list points at a vacant slot");
            assert_eq!(node.prev, prev, "broken prev link at slot {}", idx);
            assert_eq!(
                self.map.get(&node.key),
                Some(&idx),
                "index disagrees with list at slot {}",
                idx
            );
            visited += 1;
            assert!(visited <= count, "cycle in recency list");
            prev = Some(idx);
            cursor = node.next;
        }

        assert_eq!(visited, count, "list length != index size");
        assert_eq!(self.tail, prev, "tail is not the last linked entry");
    }
}

impl<K, V, S> LruCache<K, V, S> {
    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Get the maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get usage statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Reset usage statistics
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Clear the cache, keeping its capacity and statistics
    pub fn clear(&mut self) {
        let dropped = self.map.len();
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
        debug!(dropped, "cleared cache");
    }

    /// Peek at the least recently used entry
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.head
            .and_then(|idx| self.node(idx))
            .map(|node| (&node.key, &node.value))
    }

    /// Peek at the most recently used entry
    pub fn peek_mru(&self) -> Option<(&K, &V)> {
        self.tail
            .and_then(|idx| self.node(idx))
            .map(|node| (&node.key, &node.value))
    }

    /// Iterate entries from least to most recently used
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            nodes: &self.nodes,
            front: self.head,
            back: self.tail,
            remaining: self.map.len(),
        }
    }

    /// Snapshot of the keys, least recently used first
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Snapshot of the values, least recently used first
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().map(|(_, value)| value.clone()).collect()
    }

    /// Snapshot of the entries, least recently used first
    pub fn items(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn node(&self, idx: usize) -> Option<&Node<K, V>> {
        self.nodes.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(idx).and_then(Option::as_mut)
    }

    fn move_to_tail(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return; // Already most recently used
        }

        self.unlink(idx);
        self.link_tail(idx);
    }

    fn link_tail(&mut self, idx: usize) {
        let old_tail = self.tail;

        if let Some(node) = self.node_mut(idx) {
            node.prev = old_tail;
            node.next = None;
        }

        match old_tail {
            Some(tail_idx) => {
                if let Some(tail) = self.node_mut(tail_idx) {
                    tail.next = Some(idx);
                }
            }
            None => {
                self.head = Some(idx);
            }
        }

        self.tail = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.node_mut(idx) {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = self.node_mut(prev_idx) {
                    prev_node.next = next;
                }
            }
            None => {
                self.head = next;
            }
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = self.node_mut(next_idx) {
                    next_node.prev = prev;
                }
            }
            None => {
                self.tail = prev;
            }
        }
    }

    fn alloc_node(&mut self, node: Node<K, V>) -> usize {
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn release_node(&mut self, idx: usize) -> Option<Node<K, V>> {
        let node = self.nodes.get_mut(idx)?.take()?;
        self.free_list.push(idx);
        Some(node)
    }
}

impl<K, V, S> fmt::Debug for LruCache<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, S> IntoIterator for &'a LruCache<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over cache entries, least recently used first
pub struct Iter<'a, K, V> {
    nodes: &'a [Option<Node<K, V>>],
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let node = self.nodes.get(self.front?)?.as_ref()?;
        self.front = node.next;
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let node = self.nodes.get(self.back?)?.as_ref()?;
        self.back = node.prev;
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(capacity: usize, keys: &[u32]) -> LruCache<u32, u32> {
        let mut cache = LruCache::new(capacity).unwrap();
        for &key in keys {
            cache.set(key, key * 10);
        }
        cache
    }

    #[test]
    fn test_lru_zero_capacity() {
        let result = LruCache::<u32, u32>::new(0);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_lru_basic() {
        let mut cache = LruCache::new(2).unwrap();

        cache.set(1, "a");
        cache.set(2, "b");

        assert_eq!(cache.get(&1), Some(&"a"));
        assert_eq!(cache.get(&2), Some(&"b"));
        assert_eq!(cache.len(), 2);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_scenario() {
        let mut cache = LruCache::new(3).unwrap();

        cache.set("a", "1");
        cache.set("b", "2");
        cache.set("c", "3");
        assert_eq!(cache.items(), vec![("a", "1"), ("b", "2"), ("c", "3")]);

        assert_eq!(cache.set("d", "4"), Some(("a", "1")));
        assert_eq!(cache.items(), vec![("b", "2"), ("c", "3"), ("d", "4")]);

        assert_eq!(cache.get("b"), Some(&"2"));
        assert_eq!(cache.items(), vec![("c", "3"), ("d", "4"), ("b", "2")]);

        assert_eq!(cache.set("c", "x"), None);
        assert_eq!(cache.items(), vec![("d", "4"), ("b", "2"), ("c", "x")]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = filled(2, &[1, 2]);

        assert_eq!(cache.set(3, 30), Some((1, 10)));

        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&20));
        assert_eq!(cache.get(&3), Some(&30));
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_lru_eviction_keeps_relative_order() {
        let mut cache = filled(4, &[1, 2, 3, 4]);
        cache.get(&2);

        cache.set(5, 50);

        assert_eq!(cache.keys(), vec![3, 4, 2, 5]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_capacity_one() {
        let mut cache = LruCache::new(1).unwrap();

        assert_eq!(cache.set(1, "a"), None);
        assert_eq!(cache.set(2, "b"), Some((1, "a")));
        assert_eq!(cache.set(2, "c"), None);

        assert_eq!(cache.items(), vec![(2, "c")]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_get_promotes() {
        let mut cache = filled(2, &[1, 2]);
        cache.get(&1); // Move 1 to the MRU end

        cache.set(3, 30); // Should evict 2

        assert_eq!(cache.get(&1), Some(&10));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&3), Some(&30));
    }

    #[test]
    fn test_lru_repeated_get_is_idempotent() {
        let mut cache = filled(3, &[1, 2, 3]);

        cache.get(&1);
        let once = cache.items();
        cache.get(&1);

        assert_eq!(cache.items(), once);
        assert_eq!(cache.keys(), vec![2, 3, 1]);
    }

    #[test]
    fn test_lru_promote_second_oldest_repeatedly() {
        let mut cache = filled(3, &[1, 2, 3]);

        for expected in [vec![1, 3, 2], vec![1, 2, 3], vec![1, 3, 2]] {
            let second = cache.keys()[1];
            cache.get(&second);
            assert_eq!(cache.keys(), expected);
            cache.debug_validate_invariants();
        }

        assert_eq!(cache.peek_lru(), Some((&1, &10)));
        assert_eq!(cache.set(4, 40), Some((1, 10)));
    }

    #[test]
    fn test_lru_peek_does_not_promote() {
        let mut cache = filled(3, &[1, 2, 3]);
        let before = cache.items();

        assert_eq!(cache.peek(&1), Some(&10));
        assert_eq!(cache.get_with(&1, false), Some(&10));

        assert_eq!(cache.items(), before);
        assert_eq!(cache.stats().hits(), 0);
    }

    #[test]
    fn test_lru_get_mut() {
        let mut cache = filled(3, &[1, 2, 3]);

        if let Some(value) = cache.get_mut(&1) {
            *value += 1;
        }

        assert_eq!(cache.items(), vec![(2, 20), (3, 30), (1, 11)]);
        assert_eq!(cache.get_mut(&9), None);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[test]
    fn test_lru_overwrite() {
        let mut cache = LruCache::new(2).unwrap();

        cache.set(1, "a");
        cache.set(2, "b");
        cache.set(1, "c"); // Overwrite counts as an access

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.items(), vec![(2, "b"), (1, "c")]);
        assert_eq!(cache.stats().updates(), 1);
        assert_eq!(cache.stats().inserts(), 2);
    }

    #[test]
    fn test_lru_remove() {
        let mut cache = filled(3, &[1, 2, 3]);

        assert_eq!(cache.remove(&2), Some(20));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.keys(), vec![1, 3]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_delete_ends() {
        let mut cache = filled(3, &[1, 2, 3]);

        assert!(cache.delete(&1));
        assert_eq!(cache.peek_lru(), Some((&2, &20)));
        assert!(cache.delete(&3));
        assert_eq!(cache.peek_mru(), Some((&2, &20)));
        assert!(!cache.delete(&3));
        assert!(cache.delete(&2));

        assert!(cache.is_empty());
        assert_eq!(cache.peek_lru(), None);
        assert_eq!(cache.peek_mru(), None);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_reuses_freed_slots() {
        let mut cache = filled(2, &[1, 2]);

        for key in 3..50 {
            cache.set(key, key);
            cache.debug_validate_invariants();
        }
        cache.remove(&49);
        cache.set(100, 100);

        assert!(cache.nodes.len() <= 3);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_pop_lru() {
        let mut cache = filled(3, &[1, 2, 3]);

        assert_eq!(cache.pop_lru(), Some((1, 10)));
        assert_eq!(cache.pop_lru(), Some((2, 20)));
        assert_eq!(cache.pop_lru(), Some((3, 30)));
        assert_eq!(cache.pop_lru(), None);
        assert_eq!(cache.stats().evictions(), 3);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_detail() {
        let cache = filled(3, &[1, 2, 3]);

        let middle = cache.detail(&2).unwrap();
        assert_eq!(middle.value, &20);
        assert_eq!(middle.previous, Some(&1));
        assert_eq!(middle.next, Some(&3));

        let oldest = cache.detail(&1).unwrap();
        assert_eq!(oldest.previous, None);
        assert_eq!(oldest.next, Some(&2));

        assert!(cache.detail(&4).is_none());
        assert_eq!(cache.keys(), vec![1, 2, 3]);
    }

    #[test]
    fn test_lru_iter_both_ends() {
        let cache = filled(4, &[1, 2, 3, 4]);

        let mut iter = cache.iter();
        assert_eq!(iter.len(), 4);
        assert_eq!(iter.next(), Some((&1, &10)));
        assert_eq!(iter.next_back(), Some((&4, &40)));
        assert_eq!(iter.next(), Some((&2, &20)));
        assert_eq!(iter.next_back(), Some((&3, &30)));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);

        let reversed: Vec<_> = cache.iter().rev().map(|(k, _)| *k).collect();
        assert_eq!(reversed, vec![4, 3, 2, 1]);

        let mut visited = Vec::new();
        for (k, v) in &cache {
            visited.push((*k, *v));
        }
        assert_eq!(visited, cache.items());
    }

    #[test]
    fn test_lru_snapshots_are_detached() {
        let mut cache = filled(3, &[1, 2]);
        let keys = cache.keys();
        let values = cache.values();

        cache.set(3, 30);
        cache.get(&1);

        assert_eq!(keys, vec![1, 2]);
        assert_eq!(values, vec![10, 20]);
    }

    #[test]
    fn test_lru_clear() {
        let mut cache = filled(3, &[1, 2]);
        cache.get(&1);
        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits(), 1);

        cache.set(5, 50);
        assert_eq!(cache.items(), vec![(5, 50)]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_lru_custom_hasher() {
        let hasher = std::collections::hash_map::RandomState::new();
        let mut cache = LruCache::with_hasher(2, hasher).unwrap();

        cache.set("x".to_string(), 1);
        cache.set("y".to_string(), 2);
        cache.set("z".to_string(), 3);

        assert!(!cache.contains("x"));
        assert_eq!(cache.get("z"), Some(&3));
    }

    #[test]
    fn test_lru_debug_format() {
        let mut cache = filled(3, &[1, 2]);
        cache.get(&1);

        assert_eq!(format!("{:?}", cache), "{2: 20, 1: 10}");
    }

    #[test]
    fn test_lru_huge_capacity() {
        let mut cache = LruCache::new(usize::MAX).unwrap();
        cache.set(1u8, ());
        assert_eq!(cache.capacity(), usize::MAX);
    }
}
