//! Embedded atomic reference count
//!
//! # Safety
//!
//! The count follows the same protocol as `std::sync::Arc`:
//!
//! - increments are `Relaxed`: a new reference can only be made from an
//!   existing one, which already keeps the record alive;
//! - decrements are `Release`, and the caller that takes the count to zero
//!   issues an `Acquire` fence before touching the record again. Every access
//!   made through any other reference therefore happens-before reclamation.
//!
//! Only this crate mutates the count. Consumers observe it through
//! [`RefCount::get`].

use core::fmt;

use crate::sync::{AtomicUsize, Ordering, fence};

/// Counts above this abort the process instead of risking overflow.
const MAX_REFCOUNT: usize = isize::MAX as usize;

/// Atomic reference count embedded in a pooled record
pub struct RefCount {
    count: AtomicUsize,
}

impl RefCount {
    /// Create a count for a blank, unpublished record (zero references)
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(0),
        }
    }

    /// Current number of live references
    #[inline]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Set the count to one for a record about to be handed out.
    ///
    /// Called with exclusive access, before the record is shared.
    #[inline]
    pub(crate) fn publish(&self) {
        self.count.store(1, Ordering::Relaxed);
    }

    /// Add a reference. Returns the new count.
    #[inline]
    pub(crate) fn retain(&self) -> usize {
        let old = self.count.fetch_add(1, Ordering::Relaxed);
        debug_assert!(old >= 1, "retain on a record with no live references");

        if old > MAX_REFCOUNT {
            std::process::abort();
        }
        old + 1
    }

    /// Drop a reference. Returns `true` when this call released the last one.
    ///
    /// On `true` the caller owns the record exclusively and every access made
    /// through other references is visible to it.
    #[inline]
    pub(crate) fn release(&self) -> bool {
        let old = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(old >= 1, "release on a record with no live references");

        if old != 1 {
            return false;
        }
        fence(Ordering::Acquire);
        true
    }

    /// `true` when exactly one reference exists
    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        self.get() == 1
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount")
            .field(&self.count.load(Ordering::Relaxed))
            .finish()
    }
}
