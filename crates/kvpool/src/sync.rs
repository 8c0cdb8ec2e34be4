//! Atomics behind the reference count.
//!
//! Builds with `RUSTFLAGS="--cfg loom"` swap in loom's model-checked types.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{AtomicUsize, Ordering, fence};

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{AtomicUsize, Ordering, fence};
