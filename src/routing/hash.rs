//! Seeded key hashing for shard selection.
//!
//! `djb33` is djb2 (multiply by 33, xor in each byte) with the seed and key
//! length folded into the starting value, processed four bytes at a time, and
//! finished with `h ^ (h >> 16)` so the low bits used for `% shards` see the
//! high bits too.
//!
//! The seed comes from the OS CSPRNG so an attacker cannot precompute keys
//! that all land in one shard. If the CSPRNG is unavailable the store still
//! starts, with a logged warning and a weaker seed.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use rand::rngs::{OsRng, SmallRng};
use rand::{Rng, RngCore, SeedableRng};
use tracing::warn;

/// Hashes `key` with the given seed.
///
/// Pure and deterministic for a fixed seed.
///
/// ```
/// use ttlstore::routing::djb33;
///
/// assert_eq!(djb33(0, b""), 5381);
/// assert_eq!(djb33(42, b"user:1"), djb33(42, b"user:1"));
/// ```
pub fn djb33(seed: u32, key: &[u8]) -> u32 {
    // Truncating the length is fine: it only perturbs the starting value.
    let mut d = 5381u32
        .wrapping_add(seed)
        .wrapping_add(key.len() as u32);

    let mut chunks = key.chunks_exact(4);
    for chunk in &mut chunks {
        d = d.wrapping_mul(33) ^ u32::from(chunk[0]);
        d = d.wrapping_mul(33) ^ u32::from(chunk[1]);
        d = d.wrapping_mul(33) ^ u32::from(chunk[2]);
        d = d.wrapping_mul(33) ^ u32::from(chunk[3]);
    }

    match *chunks.remainder() {
        [a] => {
            d = d.wrapping_mul(33) ^ u32::from(a);
        }
        [a, b] => {
            d = d.wrapping_mul(33) ^ u32::from(a);
            d = d.wrapping_mul(33) ^ u32::from(b);
        }
        [a, b, c] => {
            d = d.wrapping_mul(33) ^ u32::from(a);
            d = d.wrapping_mul(33) ^ u32::from(b);
            d = d.wrapping_mul(33) ^ u32::from(c);
        }
        _ => {}
    }

    d ^ (d >> 16)
}

/// Draws a hash seed from the OS CSPRNG.
///
/// Falls back to a non-cryptographic generator, with a warning, when the OS
/// source fails.
pub fn random_seed() -> u32 {
    seed_from(&mut OsRng, fallback_seed)
}

fn seed_from(rng: &mut impl RngCore, fallback: impl FnOnce() -> u32) -> u32 {
    let mut buf = [0u8; 4];
    match rng.try_fill_bytes(&mut buf) {
        Ok(()) => u32::from_ne_bytes(buf),
        Err(err) => {
            warn!(
                error = %err,
                "Failed to read from the system CSPRNG; continuing with an insecure shard seed"
            );
            fallback()
        }
    }
}

fn fallback_seed() -> u32 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let pid = u64::from(std::process::id());
    SmallRng::seed_from_u64(nanos ^ (pid << 32)).gen()
}

/// Keys that can be routed to a shard.
///
/// `canonical_bytes` must be total and deterministic: equal keys always
/// produce equal bytes. Keys that borrow as each other (`String` and `str`)
/// must produce the same bytes.
pub trait ShardKey {
    fn canonical_bytes(&self) -> Cow<'_, [u8]>;
}

impl ShardKey for str {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl ShardKey for String {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl ShardKey for Box<str> {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl ShardKey for Arc<str> {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

impl ShardKey for [u8] {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl ShardKey for Vec<u8> {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self[..])
    }
}

impl ShardKey for Bytes {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self[..])
    }
}

impl<T: ShardKey + ?Sized> ShardKey for &T {
    fn canonical_bytes(&self) -> Cow<'_, [u8]> {
        (**self).canonical_bytes()
    }
}

/// Scalars hash by their decimal text form.
macro_rules! impl_shard_key_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ShardKey for $ty {
                fn canonical_bytes(&self) -> Cow<'_, [u8]> {
                    Cow::Owned(self.to_string().into_bytes())
                }
            }
        )*
    };
}

impl_shard_key_display!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, bool,
);
