//! Priority Expiry Structure
//!
//! An alternative backing store that keeps entries in a binary min-heap
//! ordered by expiry, with a key → heap position index for arbitrary removal.
//!
//! ```text
//!                 [ expires 10ms ]            <- root: soonest expiry
//!                /                \
//!       [ expires 40ms ]    [ expires 25ms ]
//!        /          \
//!   [ never ]   [ expires 90ms ]              <- never-expiring entries sink
//! ```
//!
//! The sweep only ever looks at the root: it pops while the root is expired
//! and stops at the first live root. Its cost is proportional to the number of
//! entries that actually expired, not to the size of the store, which is
//! what makes this structure attractive for large, low-churn stores.
//!
//! Compared with [`IndexedTable`](crate::IndexedTable), inserts and arbitrary
//! removals are O(log n) instead of O(1).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

use crate::storage::entry::{is_live, Clock, EvictionCallback, ExpiringEntry, Ttl, NEVER};
use crate::storage::error::{CacheError, Result};
use crate::storage::expiry::Sweepable;
use crate::storage::stats::{CacheStats, Counters};

#[derive(Debug)]
struct HeapSlot<K, V> {
    key: K,
    value: V,
    expires_at: u64,
}

/// Heap priority of a stored expiry: never-expiring entries rank last.
#[inline]
fn rank(expires_at: u64) -> u64 {
    if expires_at == NEVER {
        u64::MAX
    } else {
        expires_at
    }
}

struct HeapState<K, V> {
    slots: Vec<HeapSlot<K, V>>,
    index: HashMap<K, usize>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> HeapState<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            on_evict: None,
        }
    }

    #[inline]
    fn less(&self, i: usize, j: usize) -> bool {
        rank(self.slots[i].expires_at) < rank(self.slots[j].expires_at)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.slots.swap(i, j);
        self.reindex(i);
        self.reindex(j);
    }

    #[inline]
    fn reindex(&mut self, i: usize) {
        if let Some(pos) = self.index.get_mut(&self.slots[i].key) {
            *pos = i;
        }
    }

    /// Moves the slot at `i` towards the root. Returns true if it moved.
    fn sift_up(&mut self, mut i: usize) -> bool {
        let start = i;
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
        i != start
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * i + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, i) {
                break;
            }
            self.swap(i, child);
            i = child;
        }
    }

    /// Re-establishes heap order around a slot whose expiry changed.
    fn fix(&mut self, i: usize) {
        if !self.sift_up(i) {
            self.sift_down(i);
        }
    }

    fn upsert(&mut self, key: K, value: V, expires_at: u64) {
        match self.index.get(&key) {
            Some(&i) => {
                let slot = &mut self.slots[i];
                slot.value = value;
                slot.expires_at = expires_at;
                self.fix(i);
            }
            None => {
                let i = self.slots.len();
                self.index.insert(key.clone(), i);
                self.slots.push(HeapSlot {
                    key,
                    value,
                    expires_at,
                });
                self.sift_up(i);
            }
        }
    }

    /// Removes the slot at `i`: the last slot takes its place and is sifted
    /// to wherever it belongs.
    fn remove_at(&mut self, i: usize) -> HeapSlot<K, V> {
        let removed = self.slots.swap_remove(i);
        self.index.remove(&removed.key);
        if i < self.slots.len() {
            self.reindex(i);
            self.fix(i);
        }
        removed
    }

    #[inline]
    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).copied()
    }

    #[inline]
    fn live<Q>(&self, key: &Q, now: u64) -> Option<&HeapSlot<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = &self.slots[self.position(key)?];
        is_live(slot.expires_at, now).then_some(slot)
    }
}

/// A concurrency-safe expiring store ordered by expiry time.
///
/// # Example
///
/// ```
/// use ttlstore::{ExpiryHeap, Ttl};
/// use std::time::Duration;
///
/// let heap = ExpiryHeap::new(Duration::from_secs(60));
///
/// heap.insert("late", 1, Ttl::After(Duration::from_secs(30)));
/// heap.insert("soon", 2, Ttl::After(Duration::from_secs(5)));
/// heap.insert("forever", 3, Ttl::Never);
///
/// assert_eq!(heap.peek().map(|e| e.key), Some("soon"));
/// assert_eq!(heap.pop().map(|e| e.value), Some(2));
/// assert_eq!(heap.pop().map(|e| e.value), Some(1));
/// assert_eq!(heap.pop().map(|e| e.value), Some(3));
/// assert!(heap.pop().is_none());
/// ```
pub struct ExpiryHeap<K, V> {
    clock: Clock,
    default_ttl: Option<Duration>,
    state: RwLock<HeapState<K, V>>,
    counters: Counters,
}

impl<K, V> std::fmt::Debug for ExpiryHeap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ExpiryHeap")
            .field("entries", &state.slots.len())
            .field("default_ttl", &self.default_ttl)
            .field("on_evict", &state.on_evict.is_some())
            .finish()
    }
}

impl<K, V> ExpiryHeap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty heap. A zero `default_ttl` means entries written with
    /// `Ttl::Default` never expire.
    pub fn new(default_ttl: Duration) -> Self {
        let default_ttl = (!default_ttl.is_zero()).then_some(default_ttl);
        Self {
            clock: Clock::new(),
            default_ttl,
            state: RwLock::new(HeapState::new()),
            counters: Counters::default(),
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    fn copy_entry(&self, slot: &HeapSlot<K, V>) -> ExpiringEntry<K, V> {
        ExpiringEntry {
            key: slot.key.clone(),
            value: slot.value.clone(),
            expires_at: self.clock.instant(slot.expires_at),
        }
    }

    fn take_entry(&self, slot: HeapSlot<K, V>) -> ExpiringEntry<K, V> {
        ExpiringEntry {
            key: slot.key,
            value: slot.value,
            expires_at: self.clock.instant(slot.expires_at),
        }
    }

    /// Inserts or updates a key, O(log n).
    ///
    /// An existing entry gets the new value and expiry and is moved to its new
    /// heap position. No eviction callback fires.
    pub fn insert(&self, key: K, value: V, ttl: Ttl) {
        let expires_at = self.clock.deadline(ttl.resolve(self.default_ttl));
        self.state.write().upsert(key, value, expires_at);
        self.counters.set();
    }

    /// Inserts a key only if no live entry exists for it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::AlreadyExists`] without changing anything when a
    /// live entry is present.
    pub fn add(&self, key: K, value: V, ttl: Ttl) -> Result<()> {
        let expires_at = self.clock.deadline(ttl.resolve(self.default_ttl));
        let mut state = self.state.write();

        if state.live(&key, self.clock.now()).is_some() {
            return Err(CacheError::AlreadyExists);
        }

        state.upsert(key, value, expires_at);
        drop(state);
        self.counters.set();
        Ok(())
    }

    /// Gets the value for a live key.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.read();
        let value = state
            .live(key, self.clock.now())
            .map(|slot| slot.value.clone());
        drop(state);

        self.counters.lookup(value.is_some());
        value
    }

    /// Gets a live value together with its absolute expiry (`None` = never).
    pub fn get_with_expiration<Q>(&self, key: &Q) -> Option<(V, Option<Instant>)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.read();
        let found = state
            .live(key, self.clock.now())
            .map(|slot| (slot.value.clone(), self.clock.instant(slot.expires_at)));
        drop(state);

        self.counters.lookup(found.is_some());
        found
    }

    /// Physical membership test; ignores expiry like
    /// [`IndexedTable::contains`](crate::IndexedTable::contains).
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.read().index.contains_key(key)
    }

    /// Returns a copy of the entry that expires soonest.
    ///
    /// Never-expiring entries are only returned once nothing else is left.
    pub fn peek(&self) -> Option<ExpiringEntry<K, V>> {
        let state = self.state.read();
        state.slots.first().map(|slot| self.copy_entry(slot))
    }

    /// Removes and returns the entry that expires soonest, whether or not it
    /// has expired. No eviction callback fires; the caller gets the entry.
    pub fn pop(&self) -> Option<ExpiringEntry<K, V>> {
        let mut state = self.state.write();
        if state.slots.is_empty() {
            return None;
        }
        let slot = state.remove_at(0);
        drop(state);
        Some(self.take_entry(slot))
    }

    /// Removes an arbitrary key in O(log n).
    ///
    /// The eviction callback, if any, runs after the lock is released.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (removed, on_evict) = {
            let mut state = self.state.write();
            let Some(i) = state.position(key) else {
                return false;
            };
            (state.remove_at(i), state.on_evict.clone())
        };

        self.counters.deleted();
        if let Some(on_evict) = on_evict {
            on_evict(&removed.key, &removed.value);
        }
        true
    }

    /// Pops expired entries off the root until the root is live or the heap
    /// is empty.
    ///
    /// Callbacks run after the lock is released, in expiry order. Returns the
    /// number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let (removed, on_evict) = {
            let mut state = self.state.write();
            let now = self.clock.now();
            let mut removed = Vec::new();

            while let Some(root) = state.slots.first() {
                if is_live(root.expires_at, now) {
                    break;
                }
                removed.push(state.remove_at(0));
            }
            (removed, state.on_evict.clone())
        };

        if removed.is_empty() {
            return 0;
        }

        self.counters.expired(removed.len());
        trace!(removed = removed.len(), "Swept expired entries from heap");

        if let Some(on_evict) = on_evict {
            for slot in &removed {
                on_evict(&slot.key, &slot.value);
            }
        }
        removed.len()
    }

    /// Replaces the eviction callback. `None` disables callbacks.
    pub fn set_eviction_callback(&self, callback: Option<EvictionCallback<K, V>>) {
        self.state.write().on_evict = callback;
    }

    pub fn on_evicted<F>(&self, f: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.set_eviction_callback(Some(Arc::new(f)));
    }

    /// Returns the keys of all live entries, in heap order (not sorted).
    pub fn keys(&self) -> Vec<K> {
        let state = self.state.read();
        let now = self.clock.now();
        state
            .slots
            .iter()
            .filter(|slot| is_live(slot.expires_at, now))
            .map(|slot| slot.key.clone())
            .collect()
    }

    /// Number of physically stored entries, including expired ones that have
    /// not been swept.
    pub fn len(&self) -> usize {
        self.state.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes everything without invoking the eviction callback.
    pub fn purge(&self) {
        let purged = {
            let mut state = self.state.write();
            state.index = HashMap::new();
            mem::take(&mut state.slots)
        };
        drop(purged);
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }

    #[cfg(test)]
    fn assert_heap(&self) {
        let state = self.state.read();
        assert_eq!(state.slots.len(), state.index.len());
        for (i, slot) in state.slots.iter().enumerate() {
            assert_eq!(state.index.get(&slot.key), Some(&i));
            if i > 0 {
                let parent = &state.slots[(i - 1) / 2];
                assert!(rank(parent.expires_at) <= rank(slot.expires_at));
            }
        }
    }
}

impl<K, V> Sweepable for ExpiryHeap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn sweep_expired(&self) -> usize {
        ExpiryHeap::sweep_expired(self)
    }

    fn len(&self) -> usize {
        ExpiryHeap::len(self)
    }
}
