//! Indexed Entry Table
//!
//! The primary backing store: a dense vector of slots plus a key → position
//! index, both guarded by one reader-writer lock.
//!
//! ## Layout
//!
//! ```text
//!   index: HashMap<K, usize>          slots: Vec<Slot>
//!   ┌──────────┬─────┐               ┌─────┬─────┬─────┬─────┐
//!   │ "alpha"  │  2  │──────────────>│  0  │  1  │  2  │  3  │
//!   │ "beta"   │  0  │               └─────┴─────┴─────┴─────┘
//!   │  ...     │ ... │
//!   └──────────┴─────┘
//! ```
//!
//! `index[k] == i` iff `slots[i].key == k`. Both halves change together under
//! the write lock and never partially.
//!
//! ## Swap-Delete
//!
//! Removal moves the last slot into the hole, patches that slot's index entry,
//! truncates by one and erases the removed key: O(1), at the cost of any
//! insertion ordering. Iteration order is unspecified and callers must not
//! depend on it.
//!
//! ## Expiry
//!
//! Expired entries are invisible to `get`, `keys` and friends but stay
//! physically stored (and counted by `len`) until a sweep removes them.
//! `contains` and `for_each` deliberately look at physical entries.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

use crate::storage::entry::{is_live, nanos, Clock, EvictionCallback, Ttl, NEVER};
use crate::storage::error::{CacheError, Result};
use crate::storage::expiry::Sweepable;
use crate::storage::stats::{CacheStats, Counters};

/// A stored entry. The expiry is atomic so `get_and_renew` can push it
/// forward while holding only the shared lock.
#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    expires_at: AtomicU64,
}

impl<K, V> Slot<K, V> {
    #[inline]
    fn expires_at(&self) -> u64 {
        self.expires_at.load(Ordering::Relaxed)
    }
}

struct TableState<K, V> {
    slots: Vec<Slot<K, V>>,
    index: HashMap<K, usize>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> TableState<K, V>
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
    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).copied()
    }

    /// Returns the slot for a key if it is live at `now`.
    #[inline]
    fn live<Q>(&self, key: &Q, now: u64) -> Option<&Slot<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = &self.slots[self.position(key)?];
        is_live(slot.expires_at(), now).then_some(slot)
    }

    /// Overwrites in place or appends.
    fn upsert(&mut self, key: K, value: V, expires_at: u64) {
        match self.index.get(&key) {
            Some(&i) => {
                let slot = &mut self.slots[i];
                slot.value = value;
                *slot.expires_at.get_mut() = expires_at;
            }
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push(Slot {
                    key,
                    value,
                    expires_at: AtomicU64::new(expires_at),
                });
            }
        }
    }

    /// Swap-delete of the slot at `i`.
    fn remove_at(&mut self, i: usize) -> Slot<K, V> {
        let removed = self.slots.swap_remove(i);
        if let Some(moved) = self.slots.get(i) {
            if let Some(pos) = self.index.get_mut(&moved.key) {
                *pos = i;
            }
        }
        self.index.remove(&removed.key);
        removed
    }
}

/// A concurrency-safe expiring key-value table with O(1) insert, lookup and
/// delete.
///
/// # Example
///
/// ```
/// use ttlstore::{IndexedTable, Ttl};
/// use std::time::Duration;
///
/// let table = IndexedTable::new(Duration::from_secs(60));
///
/// table.set("name".to_string(), 1, Ttl::Default);
/// assert_eq!(table.get("name"), Some(1));
///
/// assert!(table.add("name".to_string(), 2, Ttl::Never).is_err());
/// assert!(table.delete("name"));
/// assert_eq!(table.get("name"), None);
/// ```
pub struct IndexedTable<K, V> {
    clock: Clock,
    default_ttl: Option<Duration>,
    state: RwLock<TableState<K, V>>,
    counters: Counters,
}

impl<K, V> std::fmt::Debug for IndexedTable<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("IndexedTable")
            .field("entries", &state.slots.len())
            .field("default_ttl", &self.default_ttl)
            .field("on_evict", &state.on_evict.is_some())
            .finish()
    }
}

impl<K, V> IndexedTable<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty table. A zero `default_ttl` means entries written with
    /// `Ttl::Default` never expire.
    pub fn new(default_ttl: Duration) -> Self {
        let default_ttl = (!default_ttl.is_zero()).then_some(default_ttl);
        Self::with_clock(Clock::new(), default_ttl)
    }

    pub(crate) fn with_clock(clock: Clock, default_ttl: Option<Duration>) -> Self {
        Self {
            clock,
            default_ttl,
            state: RwLock::new(TableState::new()),
            counters: Counters::default(),
        }
    }

    /// The TTL applied by `Ttl::Default`, or `None` for "never".
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Inserts or overwrites a key.
    ///
    /// An existing entry keeps its slot; its value and expiry are replaced and
    /// no eviction callback fires.
    pub fn set(&self, key: K, value: V, ttl: Ttl) {
        let expires_at = self.clock.deadline(ttl.resolve(self.default_ttl));
        self.state.write().upsert(key, value, expires_at);
        self.counters.set();
    }

    /// Inserts a key only if no live entry exists for it.
    ///
    /// An expired entry that has not been swept yet does not count as
    /// present and is overwritten.
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

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key is absent or expired, whether or not the
    /// expired entry has been swept.
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

    /// Gets a value and slides its expiry forward when it is close to
    /// expiring.
    ///
    /// When the remaining lifetime is at most a third of the default TTL, the
    /// expiry is pushed back by a third of the default TTL. Renewing only near
    /// the end avoids a write on every access. Entries that never expire, and
    /// tables without a default TTL, are returned unchanged.
    pub fn get_and_renew<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.read();
        let now = self.clock.now();

        let Some(slot) = state.live(key, now) else {
            drop(state);
            self.counters.lookup(false);
            return None;
        };

        let expires_at = slot.expires_at();
        if let Some(default) = self.default_ttl {
            let step = nanos(default) / 3;
            if expires_at != NEVER && expires_at.saturating_sub(now) <= step {
                // A failed exchange means a concurrent reader already renewed.
                let _ = slot.expires_at.compare_exchange(
                    expires_at,
                    expires_at.saturating_add(step),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
            }
        }

        let value = slot.value.clone();
        drop(state);
        self.counters.lookup(true);
        Some(value)
    }

    /// Gets a value together with its absolute expiry (`None` = never).
    pub fn get_with_expiration<Q>(&self, key: &Q) -> Option<(V, Option<Instant>)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.read();
        let found = state
            .live(key, self.clock.now())
            .map(|slot| (slot.value.clone(), self.clock.instant(slot.expires_at())));
        drop(state);

        self.counters.lookup(found.is_some());
        found
    }

    /// Runs `f` against a live value without cloning it.
    ///
    /// The shared lock is held while `f` runs; `f` must not write to this
    /// table.
    pub fn with_value<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.read();
        state.live(key, self.clock.now()).map(|slot| f(&slot.value))
    }

    /// Mutates a live value in place under the exclusive lock.
    ///
    /// The expiry is left untouched. `f` must not call back into this table.
    pub fn with_value_mut<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.write();
        let now = self.clock.now();
        let i = state.position(key)?;
        let slot = &mut state.slots[i];
        if !is_live(slot.expires_at(), now) {
            return None;
        }
        Some(f(&mut slot.value))
    }

    /// Deletes a key.
    ///
    /// If an eviction callback is registered at the time of removal it is
    /// invoked exactly once, after the lock is released. Without a callback
    /// the delete is silent.
    ///
    /// Returns `true` if an entry (live or expired) was removed.
    pub fn delete<Q>(&self, key: &Q) -> bool
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

    /// Physical membership test.
    ///
    /// Unlike `get`, this ignores expiry: an expired entry that has not been
    /// swept yet is still reported as present.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.read().index.contains_key(key)
    }

    /// Resets the expiry of a live entry. Returns `false` if there is none.
    pub fn expire<Q>(&self, key: &Q, ttl: Ttl) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expires_at = self.clock.deadline(ttl.resolve(self.default_ttl));
        let state = self.state.write();
        match state.live(key, self.clock.now()) {
            Some(slot) => {
                slot.expires_at.store(expires_at, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Removes the expiry of a live entry.
    pub fn persist<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.expire(key, Ttl::Never)
    }

    /// Remaining lifetime of a live entry.
    ///
    /// Returns `None` if the key is absent or expired, `Some(None)` if it
    /// never expires.
    pub fn remaining_ttl<Q>(&self, key: &Q) -> Option<Option<Duration>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.read();
        let now = self.clock.now();
        let slot = state.live(key, now)?;
        match slot.expires_at() {
            NEVER => Some(None),
            expires_at => Some(Some(Duration::from_nanos(expires_at - now))),
        }
    }

    /// Removes every expired entry.
    ///
    /// Callbacks for the removed entries run after the lock is released, in
    /// removal order. Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let (removed, on_evict) = {
            let mut state = self.state.write();
            let now = self.clock.now();
            let mut removed = Vec::new();

            // swap_remove brings an unvisited slot into `i`, so only advance
            // past live slots.
            let mut i = 0;
            while i < state.slots.len() {
                if is_live(state.slots[i].expires_at(), now) {
                    i += 1;
                } else {
                    removed.push(state.remove_at(i));
                }
            }
            (removed, state.on_evict.clone())
        };

        if removed.is_empty() {
            return 0;
        }

        self.counters.expired(removed.len());
        trace!(removed = removed.len(), "Swept expired entries from table");

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

    /// Registers a closure as the eviction callback.
    pub fn on_evicted<F>(&self, f: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.set_eviction_callback(Some(Arc::new(f)));
    }

    /// Returns the keys of all live entries, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        let state = self.state.read();
        let now = self.clock.now();
        state
            .slots
            .iter()
            .filter(|slot| is_live(slot.expires_at(), now))
            .map(|slot| slot.key.clone())
            .collect()
    }

    /// Visits every physically stored entry, including expired ones that
    /// have not been swept.
    ///
    /// The shared lock is held for the whole walk; `f` must not call back
    /// into this table.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        let state = self.state.read();
        for slot in &state.slots {
            f(&slot.key, &slot.value);
        }
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
        // Values are dropped outside the lock.
        drop(purged);
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.len())
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let state = self.state.read();
        assert_eq!(state.slots.len(), state.index.len());
        for (i, slot) in state.slots.iter().enumerate() {
            assert_eq!(state.index.get(&slot.key), Some(&i));
        }
    }
}

impl<K, V> Sweepable for IndexedTable<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn sweep_expired(&self) -> usize {
        IndexedTable::sweep_expired(self)
    }

    fn len(&self) -> usize {
        IndexedTable::len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    fn table() -> IndexedTable<String, i32> {
        IndexedTable::new(Duration::ZERO)
    }

    fn recorder() -> (Arc<Mutex<Vec<(String, i32)>>>, EvictionCallback<String, i32>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: EvictionCallback<String, i32> =
            Arc::new(move |k: &String, v: &i32| sink.lock().unwrap().push((k.clone(), *v)));
        (seen, callback)
    }

    #[test]
    fn test_set_and_get() {
        let table = table();
        table.set("name".into(), 7, Ttl::Never);
        assert_eq!(table.get("name"), Some(7));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let table = table();
        assert_eq!(table.get("missing"), None);
        assert!(!table.contains("missing"));
    }

    #[test]
    fn test_overwrite_in_place() {
        let table = table();
        let (seen, callback) = recorder();
        table.set_eviction_callback(Some(callback));

        table.set("a".into(), 1, Ttl::After(Duration::from_millis(10)));
        table.set("a".into(), 2, Ttl::Never);

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a"), Some(2));
        assert_eq!(table.remaining_ttl("a"), Some(None));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_lazy_expiry() {
        let table = IndexedTable::new(Duration::from_millis(200));
        table.set("a".to_string(), 1, Ttl::Default);
        assert_eq!(table.get("a"), Some(1));

        thread::sleep(Duration::from_millis(300));

        assert_eq!(table.get("a"), None);
        assert_eq!(table.get_with_expiration("a"), None);
        assert!(table.keys().is_empty());
        // Still physically there until a sweep
        assert_eq!(table.len(), 1);
        assert!(table.contains("a"));
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let table = IndexedTable::new(Duration::from_millis(10));
        table.set("a".to_string(), 1, Ttl::After(Duration::ZERO));

        thread::sleep(Duration::from_millis(30));

        assert_eq!(table.get_with_expiration("a"), Some((1, None)));
    }

    #[test]
    fn test_add_existing_live_key() {
        let table = table();
        table.set("a".into(), 1, Ttl::Never);

        let err = table.add("a".into(), 2, Ttl::Never).unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(table.get_with_expiration("a"), Some((1, None)));
    }

    #[test]
    fn test_add_over_expired_unswept_key() {
        let table = table();
        table.set("a".into(), 1, Ttl::After(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(30));

        assert!(table.add("a".into(), 2, Ttl::Never).is_ok());
        assert_eq!(table.get("a"), Some(2));
        assert_eq!(table.len(), 1);
        table.assert_consistent();
    }

    #[test]
    fn test_delete_then_add() {
        let table = table();
        table.set("a".into(), 1, Ttl::Never);

        assert!(table.delete("a"));
        assert!(!table.delete("a"));
        assert!(!table.contains("a"));
        assert!(table.add("a".into(), 3, Ttl::Never).is_ok());
        assert_eq!(table.get("a"), Some(3));
    }

    #[test]
    fn test_swap_delete_keeps_index_consistent() {
        let table = table();
        for i in 0..100 {
            table.set(format!("key{}", i), i, Ttl::Never);
        }

        for i in (0..100).step_by(3) {
            assert!(table.delete(format!("key{}", i).as_str()));
            table.assert_consistent();
        }

        for i in 0..100 {
            let expected = (i % 3 != 0).then_some(i);
            assert_eq!(table.get(format!("key{}", i).as_str()), expected);
        }
        assert_eq!(table.len(), 66);
    }

    #[test]
    fn test_delete_invokes_callback_once() {
        let table = table();
        let (seen, callback) = recorder();
        table.set_eviction_callback(Some(callback));

        table.set("x".into(), 1, Ttl::Never);
        table.delete("x");
        table.delete("x");

        assert_eq!(*seen.lock().unwrap(), vec![("x".to_string(), 1)]);
    }

    #[test]
    fn test_callback_disabled() {
        let table = table();
        let (seen, callback) = recorder();
        table.set_eviction_callback(Some(callback));
        table.set_eviction_callback(None);

        table.set("x".into(), 1, Ttl::Never);
        assert!(table.delete("x"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_callback_may_reenter_table() {
        let table = Arc::new(table());
        let inner = Arc::clone(&table);
        let lens = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lens);
        table.on_evicted(move |_, _| sink.lock().unwrap().push(inner.len()));

        table.set("x".into(), 1, Ttl::Never);
        table.set("y".into(), 2, Ttl::Never);
        table.delete("x");

        assert_eq!(*lens.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_sweep_expired() {
        let table = table();
        let (seen, callback) = recorder();
        table.set_eviction_callback(Some(callback));

        for i in 0..10 {
            let ttl = if i % 2 == 0 {
                Ttl::After(Duration::from_millis(10))
            } else {
                Ttl::Never
            };
            table.set(format!("key{}", i), i, ttl);
        }

        thread::sleep(Duration::from_millis(30));

        assert_eq!(table.sweep_expired(), 5);
        assert_eq!(table.len(), 5);
        table.assert_consistent();

        let mut evicted: Vec<i32> = seen.lock().unwrap().iter().map(|(_, v)| *v).collect();
        evicted.sort_unstable();
        assert_eq!(evicted, vec![0, 2, 4, 6, 8]);

        // Nothing left to sweep
        assert_eq!(table.sweep_expired(), 0);
        assert_eq!(table.stats().expired, 5);
    }

    #[test]
    fn test_sweep_adjacent_expired_slots() {
        // Consecutive expired slots exercise the swap that moves an
        // unvisited expired slot into the current position.
        let table = table();
        table.set("live".into(), 0, Ttl::Never);
        for i in 1..6 {
            table.set(format!("dead{}", i), i, Ttl::After(Duration::from_millis(5)));
        }

        thread::sleep(Duration::from_millis(20));

        assert_eq!(table.sweep_expired(), 5);
        assert_eq!(table.keys(), vec!["live".to_string()]);
    }

    #[test]
    fn test_keys_filtered_for_each_unfiltered() {
        let table = table();
        table.set("live".into(), 1, Ttl::Never);
        table.set("dead".into(), 2, Ttl::After(Duration::from_millis(5)));

        thread::sleep(Duration::from_millis(20));

        assert_eq!(table.keys(), vec!["live".to_string()]);

        let mut visited = Vec::new();
        table.for_each(|k, _| visited.push(k.clone()));
        visited.sort();
        assert_eq!(visited, vec!["dead".to_string(), "live".to_string()]);
    }

    #[test]
    fn test_purge_is_silent() {
        let table = table();
        let (seen, callback) = recorder();
        table.set_eviction_callback(Some(callback));

        table.set("a".into(), 1, Ttl::Never);
        table.set("b".into(), 2, Ttl::Never);
        table.purge();

        assert!(table.is_empty());
        assert!(!table.contains("a"));
        assert!(seen.lock().unwrap().is_empty());
        assert!(table.add("a".into(), 3, Ttl::Never).is_ok());
    }

    #[test]
    fn test_get_and_renew() {
        let table = IndexedTable::new(Duration::from_secs(60));
        table.set("a".to_string(), 1, Ttl::Default);

        // Far from expiry: untouched
        let (_, before) = table.get_with_expiration("a").unwrap();
        assert_eq!(table.get_and_renew("a"), Some(1));
        let (_, after) = table.get_with_expiration("a").unwrap();
        assert_eq!(before, after);

        // Within the last third: pushed back by a third of the default
        assert!(table.expire("a", Ttl::After(Duration::from_secs(5))));
        let (_, near) = table.get_with_expiration("a").unwrap();
        assert_eq!(table.get_and_renew("a"), Some(1));
        let (_, renewed) = table.get_with_expiration("a").unwrap();
        assert_eq!(renewed.unwrap() - near.unwrap(), Duration::from_secs(20));
    }

    #[test]
    fn test_get_and_renew_without_default_ttl() {
        let table = table();
        table.set("a".into(), 1, Ttl::After(Duration::from_millis(50)));
        let (_, before) = table.get_with_expiration("a").unwrap();

        assert_eq!(table.get_and_renew("a"), Some(1));
        assert_eq!(table.get_with_expiration("a").unwrap().1, before);
        assert_eq!(table.get_and_renew("missing"), None);
    }

    #[test]
    fn test_expire_and_persist() {
        let table = table();
        table.set("a".into(), 1, Ttl::Never);

        assert!(table.expire("a", Ttl::After(Duration::from_secs(10))));
        let remaining = table.remaining_ttl("a").unwrap().unwrap();
        assert!(remaining > Duration::from_secs(9));

        assert!(table.persist("a"));
        assert_eq!(table.remaining_ttl("a"), Some(None));

        assert!(!table.expire("missing", Ttl::Never));
        assert_eq!(table.remaining_ttl("missing"), None);
    }

    #[test]
    fn test_with_value() {
        let table: IndexedTable<String, Vec<u8>> = IndexedTable::new(Duration::ZERO);
        table.set("buf".into(), vec![1, 2, 3], Ttl::Never);

        assert_eq!(table.with_value("buf", |v| v.len()), Some(3));
        table.with_value_mut("buf", |v| v.push(4));
        assert_eq!(table.get("buf"), Some(vec![1, 2, 3, 4]));
        assert_eq!(table.with_value("missing", |v| v.len()), None);
    }

    #[test]
    fn test_stats() {
        let table = table();
        table.set("a".into(), 1, Ttl::Never);
        table.get("a");
        table.get("b");
        table.delete("a");

        let stats = table.stats();
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_concurrent_access() {
        let table = Arc::new(table());
        let mut handles = vec![];

        for i in 0..8 {
            let table = Arc::clone(&table);
            handles.push(thread::spawn(move || {
                for j in 0..200 {
                    let key = format!("key-{}-{}", i, j);
                    table.set(key.clone(), j, Ttl::Never);
                    assert_eq!(table.get(key.as_str()), Some(j));
                    if j % 2 == 0 {
                        assert!(table.delete(key.as_str()));
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(table.len(), 800);
        table.assert_consistent();
    }
}
