//! Cache-line aligned key/value record
//!
//! Each producer thread owns a [`ProconPool`] of [`KeyValue`] records.
//! [`KeyValue::acquire_new`] takes a record from the calling thread's pool;
//! handles may then be sent anywhere, and the last release returns the record
//! to the producer's free list.

use core::fmt;

use crate::config::{self, PoolConfig};
use crate::error::{PoolError, PoolResult};
use crate::impl_poolable;
use crate::layout::CACHE_LINE_SIZE;
use crate::pool::{NoOpCallbacks, PoolLink, PoolStatsSnapshot, Pooled, ProconPool};
use crate::refcount::RefCount;

/// A pooled key/value pair
///
/// The record occupies whole cache lines and starts on a cache-line
/// boundary, so records never share a line. `key` and `value` are written
/// before the record is published and read-only afterwards, except through
/// [`KeyValue::set_value`] on the sole handle.
#[repr(C)]
#[cfg_attr(
    any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
    ),
    repr(align(128))
)]
#[cfg_attr(target_arch = "s390x", repr(align(256)))]
#[cfg_attr(
    any(
        target_arch = "arm",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "riscv32",
        target_arch = "sparc",
        target_arch = "hexagon",
    ),
    repr(align(32))
)]
#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
        target_arch = "s390x",
        target_arch = "arm",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "riscv32",
        target_arch = "sparc",
        target_arch = "hexagon",
    )),
    repr(align(64))
)]
pub struct KeyValue {
    key: u64,
    value: u64,
    refcnt: RefCount,
    pm: PoolLink<KeyValue>,
}

const _: () = assert!(align_of::<KeyValue>() == CACHE_LINE_SIZE);
const _: () = assert!(size_of::<KeyValue>() % CACHE_LINE_SIZE == 0);

impl_poolable!(KeyValue, refcnt, pm);

thread_local! {
    static LOCAL_POOL: ProconPool<KeyValue> =
        ProconPool::from_validated(config::defaults().clone(), KeyValue::blank, NoOpCallbacks);
}

impl KeyValue {
    /// Blank record built by the pool fallback
    fn blank() -> Self {
        Self {
            key: 0,
            value: 0,
            refcnt: RefCount::new(),
            pm: PoolLink::new(),
        }
    }

    /// Create a standalone pool of key/value records
    pub fn pool(config: PoolConfig) -> PoolResult<ProconPool<Self>> {
        ProconPool::new(config, Self::blank)
    }

    /// Acquire a record holding `(key, value)` from the calling thread's pool
    ///
    /// The record comes from the free list when one is cached and from a
    /// fresh allocation otherwise. The handle holds the only reference.
    ///
    /// # Example
    /// ```
    /// use kvpool::KeyValue;
    ///
    /// let record = KeyValue::acquire_new(1, 100).unwrap();
    /// let reader = KeyValue::retain(&record);
    /// KeyValue::release(record);
    ///
    /// assert_eq!(reader.read(), (1, 100));
    /// ```
    pub fn acquire_new(key: u64, value: u64) -> PoolResult<Pooled<Self>> {
        LOCAL_POOL
            .try_with(|pool| Self::acquire_from(pool, key, value))
            .map_err(|_| {
                PoolError::invalid_state("thread-local record pool already destroyed")
            })?
    }

    /// Acquire a record holding `(key, value)` from a specific pool
    pub fn acquire_from(
        pool: &ProconPool<Self>,
        key: u64,
        value: u64,
    ) -> PoolResult<Pooled<Self>> {
        pool.acquire(|record| {
            record.key = key;
            record.value = value;
        })
    }

    /// Add a reference to a record
    pub fn retain(this: &Pooled<Self>) -> Pooled<Self> {
        Pooled::retain(this)
    }

    /// Drop a reference to a record; the last one returns it to its pool
    pub fn release(this: Pooled<Self>) {
        Pooled::release(this);
    }

    /// The `(key, value)` pair
    #[inline]
    pub fn read(&self) -> (u64, u64) {
        (self.key, self.value)
    }

    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Overwrite the value of a record held through its only handle
    ///
    /// Fails with [`PoolError::InvalidState`] while other handles exist.
    pub fn set_value(this: &mut Pooled<Self>, value: u64) -> PoolResult<()> {
        // SAFETY: only the payload is written; `refcnt` and `pm` are untouched.
        let record = unsafe { Pooled::get_mut(this) }
            .ok_or_else(|| PoolError::invalid_state("record is shared"))?;
        record.value = value;
        Ok(())
    }

    /// Statistics of the calling thread's pool
    pub fn local_pool_stats() -> PoolStatsSnapshot {
        LOCAL_POOL.try_with(ProconPool::stats).unwrap_or_default()
    }

    /// Free cached records in the calling thread's pool down to `keep`
    pub fn trim_local_pool(keep: usize) -> usize {
        LOCAL_POOL
            .try_with(|pool| pool.shrink_to(keep))
            .unwrap_or_default()
    }
}

impl fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValue")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("refcnt", &self.refcnt)
            .finish_non_exhaustive()
    }
}
