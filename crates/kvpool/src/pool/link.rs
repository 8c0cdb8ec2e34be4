//! Pool linkage embedded in every pooled record

use core::fmt;
use std::sync::{Arc, Weak};

use super::procon::PoolShared;

/// Opaque link from a record back to the pool that produced it
///
/// A blank record is unlinked. The pool links a record when it hands it
/// out, and the last release follows the link to return the record. The link
/// is weak: a record never keeps its pool alive, and a record whose pool is
/// gone is simply freed.
pub struct PoolLink<T> {
    home: Option<Weak<PoolShared<T>>>,
}

impl<T> PoolLink<T> {
    /// Create an unlinked block for a blank record
    pub const fn new() -> Self {
        Self { home: None }
    }

    /// `true` while the record's home pool is still alive
    pub fn is_linked(&self) -> bool {
        self.home
            .as_ref()
            .is_some_and(|home| home.strong_count() > 0)
    }

    /// Point this record at `shared`
    pub(crate) fn attach(&mut self, shared: &Arc<PoolShared<T>>) {
        let already_home = self
            .home
            .as_ref()
            .is_some_and(|home| core::ptr::eq(home.as_ptr(), Arc::as_ptr(shared)));

        if !already_home {
            self.home = Some(Arc::downgrade(shared));
        }
    }

    /// The home pool, if it still exists
    pub(crate) fn home(&self) -> Option<Arc<PoolShared<T>>> {
        self.home.as_ref().and_then(Weak::upgrade)
    }
}

impl<T> Default for PoolLink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PoolLink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolLink")
            .field("linked", &self.is_linked())
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn test_new_link_is_unlinked() {
        let link = PoolLink::<u64>::new();
        assert!(!link.is_linked());
        assert!(link.home().is_none());
        assert_eq!(format!("{link:?}"), "PoolLink { linked: false }");
    }
}
