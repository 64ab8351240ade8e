use std::time::Duration;

use crate::storage::error::{CacheError, Result};

/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default number of shards for a sharded store.
pub const DEFAULT_SHARDS: usize = 32;

/// Construction-time settings shared by every store type.
///
/// # Example
///
/// ```
/// use ttlstore::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::default()
///     .with_default_ttl(Duration::from_secs(300))
///     .with_sweep_interval(Duration::from_secs(30))
///     .with_shards(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL applied by `Ttl::Default` (zero = never expires)
    pub default_ttl: Duration,

    /// Interval between background sweeps (zero = no background sweeper)
    pub sweep_interval: Duration,

    /// Number of shards, used only by sharded stores
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::ZERO,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            shards: DEFAULT_SHARDS,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration from the two timing knobs, keeping the default
    /// shard count.
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            default_ttl,
            sweep_interval,
            ..Default::default()
        }
    }

    /// Sets the default TTL. Zero means entries written with `Ttl::Default`
    /// never expire.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the sweep interval. Zero disables the background sweeper; expiry
    /// is then purely lazy until `sweep_expired` is called by hand.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// The default TTL in the form stores work with.
    pub(crate) fn default_ttl(&self) -> Option<Duration> {
        if self.default_ttl.is_zero() {
            None
        } else {
            Some(self.default_ttl)
        }
    }

    /// The sweep interval, or `None` when sweeping is disabled.
    pub(crate) fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval.is_zero() {
            None
        } else {
            Some(self.sweep_interval)
        }
    }

    /// Checks that a sharded store can be built from this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(CacheError::InvalidConfig(
                "shard count must be at least 1".to_string(),
            ));
        }
        if u32::try_from(self.shards).is_err() {
            return Err(CacheError::InvalidConfig(format!(
                "shard count {} does not fit in 32 bits",
                self.shards
            )));
        }
        Ok(())
    }
}
