//! # ttlstore - An In-Process Expiring Key-Value Cache
//!
//! ttlstore is a concurrency-safe key-value cache with per-entry time-to-live
//! expiry, for memoizing or temporarily holding values without external
//! storage. It manages time only: there is no memory budget and no
//! size-bounded eviction.
//!
//! ## Features
//!
//! - **Two Backing Stores**: a dense indexed table with O(1) operations, or a
//!   heap ordered by expiry whose sweep cost follows the number of expired
//!   entries
//! - **Sharding**: a seeded hash router spreads keys over N tables, each with
//!   its own RwLock
//! - **Lazy + Active Expiry**: expired entries vanish from reads at once and
//!   are physically removed by a background sweeper thread
//! - **Eviction Callbacks**: invoked outside any lock on delete and sweep
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              ttlstore                                   │
//! │                                                                         │
//! │  caller ──> ShardedCache ──> djb33(seed, key) % N                       │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │  ┌──────────────────────────────────────────────┐  ┌─────────────────┐  │
//! │  │              Shards                          │  │  ExpiryQueue    │  │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │  │  ┌───────────┐  │  │
//! │  │  │Table 0 │ │Table 1 │ │Table 2 │ │...N    │ │  │  │ExpiryHeap │  │  │
//! │  │  │RwLock  │ │RwLock  │ │RwLock  │ │tables  │ │  │  │ RwLock    │  │  │
//! │  │  └────────┘ └────────┘ └────────┘ └────────┘ │  │  └───────────┘  │  │
//! │  └──────────────────────────────────────────────┘  └─────────────────┘  │
//! │                         ▲                                  ▲            │
//! │                         └────────────┬─────────────────────┘            │
//! │                     ┌────────────────┴────────────────────────────────┐ │
//! │                     │           Sweeper                               │ │
//! │                     │      (Dedicated Tokio Thread)                   │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use ttlstore::{create, Ttl};
//! use std::time::Duration;
//!
//! // 100ms default TTL, no background sweeper, 4 shards
//! let cache = create::<String, i32>(Duration::from_millis(100), Duration::ZERO, 4).unwrap();
//!
//! cache.set("a".to_string(), 1, Ttl::Default);
//! assert_eq!(cache.get("a"), Some(1));
//!
//! // Only one writer wins an add
//! assert!(cache.add("a".to_string(), 2, Ttl::Default).is_err());
//!
//! std::thread::sleep(Duration::from_millis(150));
//! assert_eq!(cache.get("a"), None);
//!
//! // Still stored until something sweeps it
//! assert_eq!(cache.len(), 1);
//! assert_eq!(cache.sweep_expired(), 1);
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the indexed table, the expiry heap, the sweeper and handles
//! - [`routing`]: seeded hashing and the shard router
//!
//! ## Design Highlights
//!
//! ### No Ordering
//!
//! Both stores delete by swapping the last element into the hole. Iteration
//! order is therefore unspecified, and `keys`/`for_each` make no promise
//! about it.
//!
//! ### Read Asymmetries
//!
//! `get`, `keys` and the other readers skip expired entries. `contains`,
//! `len` and `for_each` report physical entries, including expired ones that
//! have not been swept yet.
//!
//! ### Explicit Shutdown
//!
//! Every handle owns its sweeper. Dropping the handle stops the sweeper, and
//! `stop_sweeper` stops it early. A [`Sweeper`] started by hand keeps running
//! until it is stopped or dropped.

pub mod routing;
pub mod storage;

use std::hash::Hash;
use std::time::Duration;

// Re-export commonly used types for convenience
pub use routing::{djb33, ShardKey, ShardedCache, Shards};
pub use storage::{
    Cache, CacheConfig, CacheError, CacheStats, EvictionCallback, ExpiringEntry, ExpiryHeap,
    ExpiryQueue, IndexedTable, Result, Sweepable, Sweeper, Ttl,
};

/// Version of ttlstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a sharded store.
///
/// A zero `default_ttl` means "never expires by default". A zero
/// `sweep_interval` disables the background sweeper, leaving expiry purely
/// lazy until `sweep_expired` is called.
///
/// # Errors
///
/// Fails for a zero shard count, or if the sweeper cannot be started.
pub fn create<K, V>(
    default_ttl: Duration,
    sweep_interval: Duration,
    shards: usize,
) -> Result<ShardedCache<K, V>>
where
    K: Eq + Hash + Clone + ShardKey + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    ShardedCache::new(default_ttl, sweep_interval, shards)
}
