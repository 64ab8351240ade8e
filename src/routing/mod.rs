//! Shard Routing Module
//!
//! Spreads keys over independent tables so that writers to different keys
//! rarely contend for the same lock.
//!
//! - [`hash`]: seeded djb33 hash, seed generation and the [`ShardKey`] trait
//! - [`sharded`]: the [`Shards`] router and the [`ShardedCache`] handle

pub mod hash;
pub mod sharded;

pub use hash::{djb33, random_seed, ShardKey};
pub use sharded::{ShardedCache, Shards};
