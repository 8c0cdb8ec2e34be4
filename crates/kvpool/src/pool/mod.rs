//! Producer/consumer record pooling
//!
//! This module provides the pool a record type binds to:
//! - `Poolable`: where a record keeps its reference count and pool link
//! - `ProconPool`: per-producer free list with a heap-allocation fallback
//! - `Pooled`: reference-counted handle returned by `acquire`
//! - `PoolStats`: atomic counters for every pool operation

mod handle;
mod link;
mod poolable;
mod procon;
mod stats;

pub use handle::Pooled;
pub use link::PoolLink;
pub use poolable::Poolable;
pub use procon::ProconPool;
pub use stats::{PoolStats, PoolStatsSnapshot};

/// Pool lifecycle callbacks
///
/// Callbacks run on whichever thread performs the operation; `on_checkin`
/// and `on_destroy` may run on a consumer thread.
pub trait PoolCallbacks<T>: Send + Sync {
    /// Called when a record is allocated
    fn on_create(&self, _obj: &T) {}

    /// Called when a record is handed out, after initialization
    fn on_checkout(&self, _obj: &T) {}

    /// Called when the last reference to a record is released
    fn on_checkin(&self, _obj: &T) {}

    /// Called when a record is freed
    fn on_destroy(&self, _obj: &T) {}
}

/// Default no-op callbacks
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallbacks;

impl<T> PoolCallbacks<T> for NoOpCallbacks {}
