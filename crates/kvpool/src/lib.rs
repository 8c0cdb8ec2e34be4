//! # kvpool
//!
//! Reference-counted key/value records recycled through per-producer pools.
//!
//! This crate provides:
//! - [`KeyValue`]: a cache-line aligned `(key, value)` record with an embedded
//!   atomic reference count
//! - [`ProconPool`]: a producer/consumer pool that recycles released records
//!   and falls back to a heap allocation when its free list is empty
//! - [`Pooled`]: the handle consumers hold; clone to retain, drop to release
//!
//! ## Quick Start
//!
//! ```rust
//! use std::thread;
//!
//! use kvpool::prelude::*;
//!
//! let record = KeyValue::acquire_new(42, 1_000)?;
//!
//! let reader = KeyValue::retain(&record);
//! let consumer = thread::spawn(move || reader.read());
//!
//! KeyValue::release(record);
//! assert_eq!(consumer.join().unwrap(), (42, 1_000));
//! # Ok::<(), PoolError>(())
//! ```
//!
//! ## Architecture
//!
//! - Each producer thread allocates from its own `ProconPool`; records carry
//!   a weak link back to it, so the last release on any thread returns the
//!   record to the right free list
//! - Reference counting follows the `Arc` protocol: relaxed increments,
//!   release decrements and an acquire fence before reclamation
//! - Errors via the [`error`] module (thiserror), structured logging via
//!   `tracing`
//!
//! ## Model checking
//!
//! The reference count runs under loom with
//! `RUSTFLAGS="--cfg loom" cargo test -p kvpool --lib refcount`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rust_2018_idioms)]
// Record allocation and the handle's shared ownership are raw-pointer code.
#![allow(unsafe_code)]

pub mod config;
pub mod error;
mod keyvalue;
pub mod layout;
pub mod pool;
mod refcount;
mod sync;

use tracing::{debug, info};

pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{PoolError, PoolResult};
pub use keyvalue::KeyValue;
pub use layout::CACHE_LINE_SIZE;
pub use pool::{Poolable, Pooled, ProconPool};
pub use refcount::RefCount;

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::config::PoolConfig;
    pub use crate::error::{PoolError, PoolResult};
    pub use crate::keyvalue::KeyValue;
    pub use crate::pool::{PoolLink, Poolable, Pooled, ProconPool};
    pub use crate::refcount::RefCount;
}

/// Install the process-wide pool defaults.
///
/// Per-thread [`KeyValue`] pools created after this call use `config`. Must
/// run before any thread acquires a record; afterwards, and on a second
/// call, it returns [`PoolError::AlreadyInitialized`].
pub fn init(config: PoolConfig) -> PoolResult<()> {
    debug!(pool = %config.name, "installing kvpool defaults");

    config::install(config)?;

    let config = config::defaults();
    info!(
        pool = %config.name,
        max_cached = ?config.max_cached,
        max_records = ?config.max_records,
        pre_warm = config.pre_warm,
        "kvpool defaults initialized"
    );
    Ok(())
}
