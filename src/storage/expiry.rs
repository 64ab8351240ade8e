//! Background Expiry Sweeper
//!
//! This module implements a background task that periodically removes expired
//! entries from a store. This is "active expiry", as opposed to the "lazy
//! expiry" every read performs by ignoring expired entries.
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry hides expired entries but never frees them. If a key expires
//! and is never written again, it stays in memory until something sweeps it.
//!
//! ## Design
//!
//! The sweeper runs a Tokio interval loop that:
//! 1. Waits for the next tick of a fixed interval
//! 2. Calls `sweep_expired` on its target (a table, a heap or every shard)
//! 3. Logs how many entries were removed
//!
//! Every sweeper gets its own named thread (`ttlstore-sweeper`) driving a
//! current-thread runtime. It never borrows the caller's runtime, so it keeps
//! sweeping after that runtime shuts down, and stores can be created from
//! plain synchronous code. Eviction callbacks for swept entries run on this
//! thread; a slow callback delays the next sweep and nothing else.
//!
//! ## Shutdown
//!
//! Stopping is explicit: call [`Sweeper::stop`] or drop the sweeper (or the
//! store handle that owns it). Stopping twice is harmless. After stopping the
//! store keeps working; it just no longer sweeps itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::runtime::Builder;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::storage::error::{CacheError, Result};

/// A store that can drop its expired entries in one pass.
pub trait Sweepable: Send + Sync + 'static {
    /// Removes expired entries and returns how many were removed.
    fn sweep_expired(&self) -> usize;

    /// Number of physically stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A handle to a running sweeper.
///
/// When this handle is dropped, the sweeper thread will be stopped.
#[derive(Debug)]
pub struct Sweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// Guards against logging and signalling a second stop
    stopped: AtomicBool,

    /// The dedicated sweeper thread
    thread: thread::JoinHandle<()>,

    interval: Duration,
}

impl Sweeper {
    /// Starts sweeping `target` every `interval`.
    ///
    /// # Errors
    ///
    /// Fails with [`CacheError::InvalidConfig`] for a zero interval, and with
    /// [`CacheError::SweeperSpawn`] if the sweeper thread or its runtime
    /// cannot be created.
    ///
    /// # Example
    ///
    /// ```
    /// use ttlstore::{IndexedTable, Sweeper, Ttl};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let table = Arc::new(IndexedTable::<String, u32>::new(Duration::from_secs(1)));
    /// let sweeper = Sweeper::start(table.clone(), Duration::from_millis(100)).unwrap();
    ///
    /// table.set("session".to_string(), 42, Ttl::Default);
    ///
    /// // Stopping is idempotent; dropping the sweeper would also stop it
    /// sweeper.stop();
    /// sweeper.stop();
    /// ```
    pub fn start(target: Arc<dyn Sweepable>, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be non-zero".to_string(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runtime = Builder::new_current_thread().enable_time().build()?;
        let thread = thread::Builder::new()
            .name("ttlstore-sweeper".to_string())
            .spawn(move || runtime.block_on(sweeper_loop(target, interval, shutdown_rx)))?;

        info!(
            interval_ms = interval.as_millis() as u64,
            "Background expiry sweeper started"
        );

        Ok(Self {
            shutdown_tx,
            stopped: AtomicBool::new(false),
            thread,
            interval,
        })
    }

    /// Stops the sweeper.
    ///
    /// This is called automatically when the handle is dropped. Only the
    /// first call has any effect.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // The thread may already be gone if a callback panicked.
        let _ = self.shutdown_tx.send(true);
        info!("Background expiry sweeper stopped");
    }

    /// Returns true until [`Sweeper::stop`] has been called or the sweeper
    /// thread has exited on its own.
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire) && !self.thread.is_finished()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    target: Arc<dyn Sweepable>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; sweeping starts one interval in.
    ticker.tick().await;

    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() {
                    warn!("Expiry sweeper lost its handle without a stop signal");
                    return;
                }
                if *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let removed = target.sweep_expired();

        if removed > 0 {
            debug!(
                removed = removed,
                remaining = target.len(),
                "Expired entries cleaned up"
            );
        } else {
            trace!("Sweep found nothing to remove");
        }
    }
}
