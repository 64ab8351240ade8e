//! Entries, TTL arguments and the store clock
//!
//! Every store keeps expiry times as nanoseconds since its own monotonic
//! epoch. A stored expiry of [`NEVER`] (zero) means the entry does not
//! expire. Anything else is an absolute deadline computed at write time as
//! `now + ttl`.
//!
//! ```text
//!   epoch                now            expires_at
//!     │───────────────────│──────────────────│──────────▶ time
//!                         └────── ttl ───────┘
//!     live while now <= expires_at, invisible to readers afterwards
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stored expiry value meaning "never expires".
pub const NEVER: u64 = 0;

/// The TTL argument accepted by every write operation.
///
/// # Example
///
/// ```
/// use ttlstore::Ttl;
/// use std::time::Duration;
///
/// let ttl: Ttl = Duration::from_secs(30).into();
/// assert_eq!(ttl, Ttl::After(Duration::from_secs(30)));
///
/// // A zero duration is the explicit "no expiration" marker
/// assert_eq!(Ttl::After(Duration::ZERO).resolve(Some(Duration::from_secs(5))), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the default TTL the store was created with
    #[default]
    Default,
    /// The entry never expires
    Never,
    /// The entry expires after this duration (zero means never)
    After(Duration),
}

impl Ttl {
    /// Resolves this argument against a store default.
    ///
    /// Returns `None` when the entry should never expire.
    pub fn resolve(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            Ttl::Default => default,
            Ttl::Never => None,
            Ttl::After(ttl) if ttl.is_zero() => None,
            Ttl::After(ttl) => Some(ttl),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::After(ttl)
    }
}

/// An entry copied out of a store, with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiringEntry<K, V> {
    pub key: K,
    pub value: V,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl<K, V> ExpiringEntry<K, V> {
    /// Checks if this entry had expired at the given instant.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now > exp).unwrap_or(false)
    }
}

/// Callback invoked with the key and value of every deleted or swept entry.
///
/// Overwrites never trigger it. It always runs after the store lock has been
/// released, so it may call back into the store.
///
/// Deletes run it on the caller's thread. Background sweeps run it on the
/// sweeper thread, where a slow callback delays the next sweep.
pub type EvictionCallback<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Monotonic clock anchored at store creation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Clock {
    epoch: Instant,
}

impl Clock {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the epoch.
    #[inline]
    pub(crate) fn now(&self) -> u64 {
        nanos(self.epoch.elapsed())
    }

    /// Absolute deadline for a resolved TTL, or [`NEVER`].
    #[inline]
    pub(crate) fn deadline(&self, ttl: Option<Duration>) -> u64 {
        match ttl {
            // `max(1)` keeps a real deadline distinct from the sentinel.
            Some(ttl) => self.now().saturating_add(nanos(ttl)).max(1),
            None => NEVER,
        }
    }

    /// Converts a stored expiry back into an `Instant`.
    pub(crate) fn instant(&self, expires_at: u64) -> Option<Instant> {
        if expires_at == NEVER {
            None
        } else {
            Some(self.epoch + Duration::from_nanos(expires_at))
        }
    }
}

/// Saturating conversion of a duration to nanoseconds.
#[inline]
pub(crate) fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Checks a stored expiry against a clock reading.
#[inline]
pub(crate) fn is_live(expires_at: u64, now: u64) -> bool {
    expires_at == NEVER || now <= expires_at
}
