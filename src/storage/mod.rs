//! Storage Module
//!
//! This module provides the two interchangeable backing stores, the
//! background sweeper that keeps them free of expired entries, and the
//! handles that tie a store to its sweeper.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐     ┌──────────────────────────┐
//! │      IndexedTable        │     │       ExpiryHeap         │
//! │  Vec<Slot> + HashMap     │     │  min-heap + HashMap      │
//! │  RwLock, O(1) delete     │     │  RwLock, O(log n) delete │
//! └────────────┬─────────────┘     └────────────┬─────────────┘
//!              │    sweep_expired()             │
//!              └───────────────┬────────────────┘
//!                              │
//!                ┌─────────────┴─────────────┐
//!                │         Sweeper           │
//!                │ (Dedicated Tokio Thread)  │
//!                └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Lazy Expiry**: Expired entries are invisible to readers immediately
//! - **Active Expiry**: The sweeper physically removes them on a fixed interval
//! - **Eviction Callbacks**: Run outside the lock on delete and sweep
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//!
//! ## Example
//!
//! ```
//! use ttlstore::storage::{Cache, Ttl};
//! use std::time::Duration;
//!
//! // Default TTL of one hour, no background sweeper
//! let cache = Cache::new(Duration::from_secs(3600), Duration::ZERO).unwrap();
//!
//! cache.set("name".to_string(), "Ariz".to_string(), Ttl::Default);
//! assert_eq!(cache.get("name"), Some("Ariz".to_string()));
//!
//! cache.set("pinned".to_string(), "forever".to_string(), Ttl::Never);
//! assert_eq!(cache.remaining_ttl("pinned"), Some(None));
//! ```

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod expiry;
pub mod heap;
pub mod stats;
pub mod table;

// Re-export commonly used types
pub use cache::{Cache, ExpiryQueue};
pub use config::{CacheConfig, DEFAULT_SHARDS, DEFAULT_SWEEP_INTERVAL};
pub use entry::{EvictionCallback, ExpiringEntry, Ttl};
pub use error::{CacheError, Result};
pub use expiry::{Sweepable, Sweeper};
pub use heap::ExpiryHeap;
pub use stats::CacheStats;
pub use table::IndexedTable;
