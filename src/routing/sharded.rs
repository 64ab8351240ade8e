//! Sharded Store
//!
//! Partitions keys across N independent [`IndexedTable`]s to cut lock
//! contention. Each key is routed by `djb33(seed, key) % N` to exactly one
//! shard and every single-key operation is delegated to that shard unchanged.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Shards                               │
//! │  seed ──> djb33(seed, key) % N                              │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Whole-store operations (`sweep_expired`, `purge`, `keys`, `for_each`)
//! visit the shards one after another. They are not atomic snapshots: a
//! concurrent writer may make a key appear zero times or once, but never
//! twice.

use std::borrow::Borrow;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::routing::hash::{djb33, random_seed, ShardKey};
use crate::storage::config::CacheConfig;
use crate::storage::entry::{Clock, EvictionCallback, Ttl};
use crate::storage::error::Result;
use crate::storage::expiry::{Sweepable, Sweeper};
use crate::storage::stats::CacheStats;
use crate::storage::table::IndexedTable;

/// The shard router: a seed and a fixed set of tables.
pub struct Shards<K, V> {
    seed: u32,
    tables: Box<[IndexedTable<K, V>]>,
}

impl<K, V> std::fmt::Debug for Shards<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shards")
            .field("shards", &self.tables.len())
            .finish()
    }
}

impl<K, V> Shards<K, V>
where
    K: Eq + Hash + Clone + ShardKey,
    V: Clone,
{
    /// Creates `config.shards` empty tables with a random seed.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Self::with_seed(config, random_seed())
    }

    /// Creates the router with a fixed seed, for reproducible placement.
    pub fn with_seed(config: &CacheConfig, seed: u32) -> Result<Self> {
        config.validate()?;

        // One clock for every shard keeps expiry instants comparable.
        let clock = Clock::new();
        let tables = (0..config.shards)
            .map(|_| IndexedTable::with_clock(clock, config.default_ttl()))
            .collect();

        debug!(shards = config.shards, "Shard router initialized");
        Ok(Self { seed, tables })
    }

    /// Determines which shard a key belongs to.
    #[inline]
    pub fn shard_index<Q>(&self, key: &Q) -> usize
    where
        Q: ShardKey + ?Sized,
    {
        let hash = djb33(self.seed, &key.canonical_bytes());
        // The shard count was validated to fit in a u32.
        (hash % self.tables.len() as u32) as usize
    }

    /// Gets the shard for a given key.
    #[inline]
    fn shard<Q>(&self, key: &Q) -> &IndexedTable<K, V>
    where
        Q: ShardKey + ?Sized,
    {
        &self.tables[self.shard_index(key)]
    }

    pub fn shard_count(&self) -> usize {
        self.tables.len()
    }

    pub fn set(&self, key: K, value: V, ttl: Ttl) {
        self.shard(&key).set(key, value, ttl)
    }

    pub fn add(&self, key: K, value: V, ttl: Ttl) -> Result<()> {
        self.shard(&key).add(key, value, ttl)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).get(key)
    }

    pub fn get_and_renew<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).get_and_renew(key)
    }

    pub fn get_with_expiration<Q>(&self, key: &Q) -> Option<(V, Option<Instant>)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).get_with_expiration(key)
    }

    pub fn with_value<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).with_value(key, f)
    }

    pub fn with_value_mut<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).with_value_mut(key, f)
    }

    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).delete(key)
    }

    /// Physical membership test; ignores expiry.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).contains(key)
    }

    pub fn expire<Q>(&self, key: &Q, ttl: Ttl) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).expire(key, ttl)
    }

    pub fn persist<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).persist(key)
    }

    pub fn remaining_ttl<Q>(&self, key: &Q) -> Option<Option<Duration>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ShardKey + ?Sized,
    {
        self.shard(key).remaining_ttl(key)
    }

    /// Sweeps every shard in turn; each shard is locked only for its own pass.
    pub fn sweep_expired(&self) -> usize {
        self.tables.iter().map(IndexedTable::sweep_expired).sum()
    }

    /// Installs the same callback on every shard.
    pub fn set_eviction_callback(&self, callback: Option<EvictionCallback<K, V>>) {
        for table in self.tables.iter() {
            table.set_eviction_callback(callback.clone());
        }
    }

    pub fn on_evicted<F>(&self, f: F)
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.set_eviction_callback(Some(Arc::new(f)));
    }

    /// Live keys of every shard, concatenated.
    pub fn keys(&self) -> Vec<K> {
        self.tables.iter().flat_map(IndexedTable::keys).collect()
    }

    /// Visits every physical entry of every shard, one shard lock at a time.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        for table in self.tables.iter() {
            table.for_each(&mut f);
        }
    }

    pub fn len(&self) -> usize {
        self.tables.iter().map(IndexedTable::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(IndexedTable::is_empty)
    }

    pub fn purge(&self) {
        for table in self.tables.iter() {
            table.purge();
        }
    }

    /// Per-shard physical entry counts.
    pub fn shard_lens(&self) -> Vec<usize> {
        self.tables.iter().map(IndexedTable::len).collect()
    }

    /// Counters summed over all shards.
    pub fn stats(&self) -> CacheStats {
        self.tables
            .iter()
            .map(IndexedTable::stats)
            .fold(CacheStats::default(), |acc, stats| acc + stats)
    }
}

impl<K, V> Sweepable for Shards<K, V>
where
    K: Eq + Hash + Clone + ShardKey + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn sweep_expired(&self) -> usize {
        Shards::sweep_expired(self)
    }

    fn len(&self) -> usize {
        Shards::len(self)
    }
}

/// A sharded store that owns its background sweeper.
///
/// Dereferences to [`Shards`] for every store operation. Dropping the handle
/// stops the sweeper; [`ShardedCache::stop_sweeper`] does so early.
///
/// # Example
///
/// ```
/// use ttlstore::{ShardedCache, Ttl};
/// use std::time::Duration;
///
/// let cache = ShardedCache::new(Duration::from_secs(60), Duration::ZERO, 8).unwrap();
///
/// cache.set("user:1".to_string(), "Ariz", Ttl::Default);
/// assert_eq!(cache.get("user:1"), Some("Ariz"));
/// assert_eq!(cache.shard_count(), 8);
/// ```
#[derive(Debug)]
pub struct ShardedCache<K, V> {
    shards: Arc<Shards<K, V>>,
    sweeper: Option<Sweeper>,
}

impl<K, V> ShardedCache<K, V>
where
    K: Eq + Hash + Clone + ShardKey + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a sharded store.
    ///
    /// A zero `default_ttl` means "never expires by default"; a zero
    /// `sweep_interval` disables the background sweeper.
    pub fn new(default_ttl: Duration, sweep_interval: Duration, shards: usize) -> Result<Self> {
        Self::with_config(CacheConfig::new(default_ttl, sweep_interval).with_shards(shards))
    }

    pub fn with_config(config: CacheConfig) -> Result<Self> {
        let shards = Arc::new(Shards::new(&config)?);
        let sweeper = match config.sweep_interval() {
            Some(interval) => Some(Sweeper::start(shards.clone(), interval)?),
            None => None,
        };
        Ok(Self { shards, sweeper })
    }
}

impl<K, V> ShardedCache<K, V> {
    /// Stops the background sweeper. Safe to call more than once.
    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }

    /// Returns true while a background sweeper is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(Sweeper::is_running)
    }
}

impl<K, V> Deref for ShardedCache<K, V> {
    type Target = Shards<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.shards
    }
}
