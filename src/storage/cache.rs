//! Store handles that own a background sweeper.
//!
//! A handle shares its store with the sweeper thread through an `Arc` and
//! dereferences to the store for every operation. Dropping the handle stops
//! the sweeper; `stop_sweeper` does it early. Either way the store stays
//! readable and writable afterwards, it just stops sweeping itself.

use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::config::CacheConfig;
use crate::storage::error::Result;
use crate::storage::expiry::{Sweepable, Sweeper};
use crate::storage::heap::ExpiryHeap;
use crate::storage::table::IndexedTable;

fn start_sweeper<S>(store: &Arc<S>, config: &CacheConfig) -> Result<Option<Sweeper>>
where
    S: Sweepable,
{
    config
        .sweep_interval()
        .map(|interval| Sweeper::start(store.clone(), interval))
        .transpose()
}

/// A single-table store with an optional background sweeper.
///
/// # Example
///
/// ```
/// use ttlstore::{Cache, Ttl};
/// use std::time::Duration;
///
/// let cache = Cache::new(Duration::from_secs(300), Duration::from_secs(60)).unwrap();
///
/// cache.set("session".to_string(), "token123", Ttl::Default);
/// assert_eq!(cache.get("session"), Some("token123"));
///
/// cache.stop_sweeper();
/// ```
#[derive(Debug)]
pub struct Cache<K, V> {
    table: Arc<IndexedTable<K, V>>,
    sweeper: Option<Sweeper>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a store. A zero `default_ttl` means "never expires by
    /// default"; a zero `sweep_interval` disables the background sweeper.
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Result<Self> {
        Self::with_config(CacheConfig::new(default_ttl, sweep_interval))
    }

    /// Creates a store from a configuration. `config.shards` is ignored.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        let table = Arc::new(IndexedTable::new(config.default_ttl));
        let sweeper = start_sweeper(&table, &config)?;
        Ok(Self { table, sweeper })
    }
}

impl<K, V> Cache<K, V> {
    /// Stops the background sweeper. Safe to call more than once.
    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(Sweeper::is_running)
    }
}

impl<K, V> Deref for Cache<K, V> {
    type Target = IndexedTable<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

/// An expiry-ordered store with an optional background sweeper.
///
/// Each tick pops expired entries off the heap root, so sweep cost follows
/// the number of expired entries rather than the store size.
#[derive(Debug)]
pub struct ExpiryQueue<K, V> {
    heap: Arc<ExpiryHeap<K, V>>,
    sweeper: Option<Sweeper>,
}

impl<K, V> ExpiryQueue<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Result<Self> {
        Self::with_config(CacheConfig::new(default_ttl, sweep_interval))
    }

    pub fn with_config(config: CacheConfig) -> Result<Self> {
        let heap = Arc::new(ExpiryHeap::new(config.default_ttl));
        let sweeper = start_sweeper(&heap, &config)?;
        Ok(Self { heap, sweeper })
    }
}

impl<K, V> ExpiryQueue<K, V> {
    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(Sweeper::is_running)
    }
}

impl<K, V> Deref for ExpiryQueue<K, V> {
    type Target = ExpiryHeap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::entry::Ttl;
    use std::sync::Mutex;
    use std::time::Instant;

    fn wait_until(done: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_cache_without_sweeper_is_lazy() {
        let cache: Cache<String, i32> =
            Cache::new(Duration::from_millis(100), Duration::ZERO).unwrap();
        assert!(!cache.is_sweeping());

        cache.set("a".into(), 1, Ttl::Default);
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_sweeps_on_runtime() {
        let cache: Cache<String, i32> =
            Cache::new(Duration::from_millis(20), Duration::from_millis(10)).unwrap();
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        cache.on_evicted(move |k, v| sink.lock().unwrap().push((k.clone(), *v)));

        cache.set("a".into(), 1, Ttl::Default);
        cache.set("b".into(), 2, Ttl::Never);

        let deadline = Instant::now() + Duration::from_secs(2);
        while cache.len() > 1 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(*evicted.lock().unwrap(), vec![("a".to_string(), 1)]);
    }

    #[test]
    fn test_cache_keeps_sweeping_after_its_runtime_shuts_down() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let cache: Cache<String, i32> = runtime.block_on(async {
            Cache::new(Duration::from_millis(10), Duration::from_millis(10)).unwrap()
        });
        drop(runtime);

        cache.set("a".into(), 1, Ttl::Default);

        assert!(wait_until(|| cache.is_empty()));
        assert!(cache.is_sweeping());
    }

    #[tokio::test]
    async fn test_stopped_cache_keeps_working() {
        let cache: Cache<String, i32> =
            Cache::new(Duration::from_millis(10), Duration::from_millis(10)).unwrap();
        assert!(cache.is_sweeping());
        cache.stop_sweeper();
        cache.stop_sweeper();
        assert!(!cache.is_sweeping());

        cache.set("a".into(), 1, Ttl::Default);
        tokio::time::sleep(Duration::from_millis(60)).await;

        // Expired but unswept
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expiry_queue_drains_in_background() {
        let queue: ExpiryQueue<u32, u32> =
            ExpiryQueue::new(Duration::from_millis(10), Duration::from_millis(10)).unwrap();

        for i in 0..50 {
            queue.insert(i, i, Ttl::Default);
        }
        queue.insert(1000, 1000, Ttl::Never);

        assert!(wait_until(|| queue.len() == 1));
        assert_eq!(queue.peek().map(|e| e.key), Some(1000));
        assert_eq!(queue.stats().expired, 50);
    }
}
