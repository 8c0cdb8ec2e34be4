//! Producer/consumer record pool
//!
//! # Safety
//!
//! Records are heap allocations owned by exactly one party at a time: the
//! pool's free list, a set of [`Pooled`] handles sharing one reference count,
//! or the thread running the last release. Raw allocation is limited to
//! [`allocate_record`]; everything else moves `Box<T>` values around.

use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::alloc;
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use tracing::{debug, trace, warn};

use super::{NoOpCallbacks, PoolCallbacks, PoolStats, PoolStatsSnapshot, Pooled, Poolable};
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};

/// Per-producer pool of reference-counted records
///
/// A producer acquires records from its pool; consumers on any thread hold
/// [`Pooled`] handles and the last release sends the record back to this
/// pool's lock-free free list. When the free list is empty the pool calls its
/// fallback to build a blank record and places it in a fresh heap allocation
/// of exactly one record.
///
/// Dropping the pool frees every cached record. Records still held by
/// consumers stay valid and are freed by their last release.
///
/// # Example
/// ```
/// use kvpool::{KeyValue, PoolConfig};
///
/// let pool = KeyValue::pool(PoolConfig::default().with_name("sessions")).unwrap();
/// let record = KeyValue::acquire_from(&pool, 7, 49).unwrap();
/// assert_eq!(record.read(), (7, 49));
///
/// drop(record);
/// assert_eq!(pool.available(), 1);
/// ```
pub struct ProconPool<T> {
    shared: Arc<PoolShared<T>>,
}

/// State shared between a pool and the records that point back at it
pub(crate) struct PoolShared<T> {
    free: SegQueue<Box<T>>,
    fallback: Box<dyn Fn() -> T + Send + Sync>,
    callbacks: Box<dyn PoolCallbacks<T>>,
    config: PoolConfig,
    stats: PoolStats,
    /// Records allocated and not yet freed; enforces `max_records`
    allocated: AtomicUsize,
}

impl<T: Poolable> ProconPool<T> {
    /// Create a pool whose fallback builds blank records with `fallback`
    pub fn new<F>(config: PoolConfig, fallback: F) -> PoolResult<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_callbacks(config, fallback, NoOpCallbacks)
    }

    /// Create a pool for a record type whose blank state is its `Default`
    pub fn with_default(config: PoolConfig) -> PoolResult<Self>
    where
        T: Default,
    {
        Self::new(config, T::default)
    }

    /// Create a pool that reports lifecycle events to `callbacks`
    pub fn with_callbacks<F, C>(
        config: PoolConfig,
        fallback: F,
        callbacks: C,
    ) -> PoolResult<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
        C: PoolCallbacks<T> + 'static,
    {
        config.validate()?;
        Ok(Self::from_validated(config, fallback, callbacks))
    }

    /// Build a pool from a configuration that already passed validation
    pub(crate) fn from_validated<F, C>(config: PoolConfig, fallback: F, callbacks: C) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        C: PoolCallbacks<T> + 'static,
    {
        let pool = Self {
            shared: Arc::new(PoolShared {
                free: SegQueue::new(),
                fallback: Box::new(fallback),
                callbacks: Box::new(callbacks),
                config,
                stats: PoolStats::default(),
                allocated: AtomicUsize::new(0),
            }),
        };

        let config = &pool.shared.config;
        if config.pre_warm
            && let Err(error) = pool.reserve(config.initial_capacity)
        {
            warn!(pool = %config.name, %error, "pre-warm stopped early");
        }

        debug!(
            pool = %config.name,
            cached = pool.available(),
            max_cached = ?config.max_cached,
            max_records = ?config.max_records,
            "record pool created"
        );
        pool
    }

    /// Acquire a record, initializing it with `init` before it is published
    ///
    /// Reuses a record from the free list when one is available and falls
    /// back to a fresh allocation otherwise. The returned handle holds the
    /// only reference.
    pub fn acquire<F>(&self, init: F) -> PoolResult<Pooled<T>>
    where
        F: FnOnce(&mut T),
    {
        let record = match self.shared.free.pop() {
            Some(record) => {
                self.shared.stats.record_hit();
                record
            }
            None => {
                self.shared.stats.record_miss();
                self.shared
                    .allocate()
                    .inspect_err(|_| self.shared.stats.record_failure())?
            }
        };

        Ok(self.publish(record, init))
    }

    /// Acquire a cached record without allocating
    pub fn try_acquire<F>(&self, init: F) -> Option<Pooled<T>>
    where
        F: FnOnce(&mut T),
    {
        let Some(record) = self.shared.free.pop() else {
            self.shared.stats.record_miss();
            return None;
        };

        self.shared.stats.record_hit();
        Some(self.publish(record, init))
    }

    fn publish<F>(&self, mut record: Box<T>, init: F) -> Pooled<T>
    where
        F: FnOnce(&mut T),
    {
        init(&mut record);
        record.pool_link_mut().attach(&self.shared);
        record.refcnt().publish();

        self.shared.callbacks.on_checkout(&record);
        self.shared.stats.record_checkout();
        Pooled::from_box(record)
    }

    /// Allocate `additional` records onto the free list
    pub fn reserve(&self, additional: usize) -> PoolResult<()> {
        if let Some(max) = self.shared.config.max_cached {
            let wanted = self.available().saturating_add(additional);
            if wanted > max {
                return Err(PoolError::pool_exhausted(&self.shared.config.name, max));
            }
        }

        for _ in 0..additional {
            let record = self.shared.allocate()?;
            self.shared.free.push(record);
        }
        Ok(())
    }
}

impl<T> ProconPool<T> {
    /// Free cached records until at most `size` remain; returns how many
    /// were freed
    pub fn shrink_to(&self, size: usize) -> usize {
        let freed = self.shared.free_cached(size);
        debug!(pool = %self.shared.config.name, freed, "record pool shrunk");
        freed
    }

    /// Free every cached record
    pub fn clear(&self) -> usize {
        let freed = self.shared.free_cached(0);
        debug!(pool = %self.shared.config.name, freed, "record pool cleared");
        freed
    }

    /// Records waiting on the free list
    pub fn available(&self) -> usize {
        self.shared.free.len()
    }

    /// Records currently held by consumers
    pub fn live(&self) -> usize {
        self.shared.stats.live()
    }

    /// Records allocated by this pool and not yet freed
    pub fn allocated(&self) -> usize {
        self.shared.allocated.load(Ordering::Acquire)
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }
}

impl<T> fmt::Debug for ProconPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProconPool")
            .field("name", &self.name())
            .field("available", &self.available())
            .field("live", &self.live())
            .finish_non_exhaustive()
    }
}

impl<T: Poolable> PoolShared<T> {
    /// Build a blank record through the fallback in a fresh allocation
    fn allocate(&self) -> PoolResult<Box<T>> {
        self.reserve_slot()?;

        match allocate_record((self.fallback)()) {
            Ok(record) => {
                self.callbacks.on_create(&record);
                self.stats.record_alloc();
                trace!(pool = %self.config.name, "allocated record");
                Ok(record)
            }
            Err(error) => {
                self.allocated.fetch_sub(1, Ordering::Release);
                Err(error)
            }
        }
    }

    fn reserve_slot(&self) -> PoolResult<()> {
        let Some(max) = self.config.max_records else {
            self.allocated.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };

        self.allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < max).then_some(count + 1)
            })
            .map(drop)
            .map_err(|_| PoolError::pool_exhausted(&self.config.name, max))
    }

    /// Take back a record whose last reference was just released
    fn check_in(&self, mut record: Box<T>) {
        self.stats.record_return();
        self.callbacks.on_checkin(&record);

        if !record.is_reusable() {
            self.destroy(record);
            return;
        }

        if self
            .config
            .max_cached
            .is_some_and(|max| self.free.len() >= max)
        {
            self.destroy(record);
            return;
        }

        record.reset();
        self.free.push(record);
    }
}

impl<T> PoolShared<T> {
    fn free_cached(&self, keep: usize) -> usize {
        let mut freed = 0;
        while self.free.len() > keep {
            let Some(record) = self.free.pop() else {
                break;
            };
            self.destroy(record);
            freed += 1;
        }
        freed
    }

    fn destroy(&self, record: Box<T>) {
        self.callbacks.on_destroy(&record);
        self.allocated.fetch_sub(1, Ordering::Release);
        self.stats.record_free();
        trace!(pool = %self.config.name, "freed record");
    }
}

impl<T> Drop for PoolShared<T> {
    fn drop(&mut self) {
        let freed = self.free_cached(0);
        debug!(
            pool = %self.config.name,
            freed,
            outstanding = self.stats.live(),
            "record pool drained"
        );
    }
}

/// Return a released record to its home pool, or free it if the pool is gone
pub(crate) fn return_record<T: Poolable>(record: Box<T>) {
    let home = record.pool_link().home();
    match home {
        Some(shared) => shared.check_in(record),
        None => trace!("home pool gone, freeing record"),
    }
}

/// Move `value` into a new heap allocation sized and aligned for one `T`
///
/// Unlike `Box::new`, running out of memory is reported as an error.
fn allocate_record<T>(value: T) -> PoolResult<Box<T>> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(Box::new(value));
    }

    // SAFETY: layout has a non-zero size.
    let ptr = unsafe { alloc::alloc(layout) }.cast::<T>();
    let Some(ptr) = NonNull::new(ptr) else {
        return Err(PoolError::allocation_failed_with_layout(layout));
    };

    // SAFETY: ptr is a live, uninitialized allocation from the global
    // allocator with the layout of `T`, which is exactly what `Box<T>` frees.
    unsafe {
        ptr.as_ptr().write(value);
        Ok(Box::from_raw(ptr.as_ptr()))
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::impl_poolable;
    use crate::pool::PoolLink;
    use crate::refcount::RefCount;

    #[derive(Debug, Default)]
    struct Slot {
        value: u32,
        oversized: bool,
        refcnt: RefCount,
        pm: PoolLink<Slot>,
    }

    // SAFETY: `refcnt` and `pool_link` return fields of `self`, and
    // `pool_link_mut` returns the same link field.
    unsafe impl Poolable for Slot {
        fn refcnt(&self) -> &RefCount {
            &self.refcnt
        }

        fn pool_link(&self) -> &PoolLink<Self> {
            &self.pm
        }

        fn pool_link_mut(&mut self) -> &mut PoolLink<Self> {
            &mut self.pm
        }

        fn reset(&mut self) {
            self.value = 0;
        }

        fn is_reusable(&self) -> bool {
            !self.oversized
        }
    }

    #[derive(Default)]
    struct Token {
        refcnt: RefCount,
        pm: PoolLink<Token>,
    }

    impl_poolable!(Token, refcnt, pm);

    fn slot_pool(config: PoolConfig) -> ProconPool<Slot> {
        ProconPool::with_default(config).unwrap()
    }

    #[test]
    fn test_acquire_allocates_then_recycles() {
        let pool = slot_pool(PoolConfig::default());

        let first = pool.acquire(|slot| slot.value = 5).unwrap();
        assert_eq!(first.value, 5);
        assert_eq!(Pooled::ref_count(&first), 1);
        assert!(first.pool_link().is_linked());
        let address = Pooled::as_ptr(&first);
        drop(first);

        assert_eq!(pool.available(), 1);

        let second = pool.acquire(|slot| slot.value += 9).unwrap();
        assert_eq!(Pooled::as_ptr(&second), address);
        // reset() zeroed the value before the record was cached.
        assert_eq!(second.value, 9);

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_creates, 1);
    }

    #[test]
    fn test_try_acquire_never_allocates() {
        let pool = slot_pool(PoolConfig::default());
        assert!(pool.try_acquire(|_| {}).is_none());
        assert_eq!(pool.allocated(), 0);

        pool.reserve(2).unwrap();
        let slot = pool.try_acquire(|slot| slot.value = 1).unwrap();
        assert_eq!(slot.value, 1);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_max_records_exhausts() {
        let pool = slot_pool(PoolConfig::default().with_max_records(Some(2)));

        let a = pool.acquire(|_| {}).unwrap();
        let b = pool.acquire(|_| {}).unwrap();
        let error = pool.acquire(|_| {}).unwrap_err();
        assert!(error.is_retryable());
        assert_eq!(pool.stats().failures, 1);

        drop(a);
        let c = pool.acquire(|_| {}).unwrap();
        assert_eq!(pool.allocated(), 2);
        drop((b, c));
    }

    #[test]
    fn test_max_cached_frees_overflow() {
        let pool = slot_pool(PoolConfig::default().with_max_cached(Some(1)));

        let a = pool.acquire(|_| {}).unwrap();
        let b = pool.acquire(|_| {}).unwrap();
        drop(a);
        drop(b);

        assert_eq!(pool.available(), 1);
        assert_eq!(pool.allocated(), 1);
        assert_eq!(pool.stats().total_destroys, 1);
    }

    #[test]
    fn test_unreusable_record_is_freed() {
        let pool = slot_pool(PoolConfig::default());
        let slot = pool.acquire(|slot| slot.oversized = true).unwrap();
        drop(slot);

        assert_eq!(pool.available(), 0);
        assert_eq!(pool.allocated(), 0);
    }

    #[test]
    fn test_pre_warm_and_shrink() {
        let pool = slot_pool(PoolConfig::bounded(8));
        assert_eq!(pool.available(), 8);
        assert_eq!(pool.stats().total_creates, 8);

        assert_eq!(pool.shrink_to(3), 5);
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.clear(), 3);
        assert_eq!(pool.allocated(), 0);
    }

    #[test]
    fn test_reserve_respects_cache_cap() {
        let pool = slot_pool(PoolConfig::default().with_max_cached(Some(4)));
        pool.reserve(3).unwrap();
        assert!(pool.reserve(2).is_err());
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_record_outlives_pool() {
        let pool = slot_pool(PoolConfig::default());
        let slot = pool.acquire(|slot| slot.value = 77).unwrap();
        drop(pool);

        assert!(!slot.pool_link().is_linked());
        assert_eq!(slot.value, 77);
        drop(slot);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = ProconPool::<Token>::with_default(PoolConfig::default().with_name(""));
        assert!(matches!(result, Err(PoolError::InvalidConfig { .. })));
    }

    #[test]
    fn test_callbacks_see_lifecycle() {
        #[derive(Default)]
        struct Journal(Mutex<Vec<&'static str>>);

        impl PoolCallbacks<Token> for Arc<Journal> {
            fn on_create(&self, _: &Token) {
                self.0.lock().unwrap().push("create");
            }
            fn on_checkout(&self, _: &Token) {
                self.0.lock().unwrap().push("checkout");
            }
            fn on_checkin(&self, _: &Token) {
                self.0.lock().unwrap().push("checkin");
            }
            fn on_destroy(&self, _: &Token) {
                self.0.lock().unwrap().push("destroy");
            }
        }

        let journal = Arc::new(Journal::default());
        let pool = ProconPool::with_callbacks(
            PoolConfig::default(),
            Token::default,
            Arc::clone(&journal),
        )
        .unwrap();

        let token = pool.acquire(|_| {}).unwrap();
        drop(token);
        drop(pool);

        assert_eq!(
            *journal.0.lock().unwrap(),
            ["create", "checkout", "checkin", "destroy"]
        );
    }

    #[test]
    fn test_debug_output() {
        let pool = ProconPool::<Token>::with_default(PoolConfig::default().with_name("tokens"))
            .unwrap();
        let text = format!("{pool:?}");
        assert!(text.contains("tokens"));
        assert!(text.contains("available: 0"));
    }
}
