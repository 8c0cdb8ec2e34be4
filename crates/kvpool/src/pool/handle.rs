//! Reference-counted handle to a pooled record
//!
//! # Safety
//!
//! A `Pooled<T>` points at a record that was leaked out of a `Box<T>` by the
//! pool when it was published. Every handle owns one unit of the record's
//! embedded [`RefCount`](crate::RefCount); the handle whose drop takes the
//! count to zero rebuilds the `Box<T>` and passes it to the home pool. No
//! handle can outlive its own reference, so the record is never read after it
//! has been recycled.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

use super::Poolable;
use super::procon::return_record;

/// Shared handle to a pooled record
///
/// Cloning a handle retains the record and dropping it releases. Release is
/// also available as the consuming [`Pooled::release`], which makes any later
/// use a compile error.
pub struct Pooled<T: Poolable> {
    ptr: NonNull<T>,
    _owns: PhantomData<T>,
}

// SAFETY: a handle gives shared access to `T` from any thread and may run the
// last release on any thread; `Poolable` already requires `Send + Sync`.
unsafe impl<T: Poolable> Send for Pooled<T> {}
// SAFETY: see above.
unsafe impl<T: Poolable> Sync for Pooled<T> {}

impl<T: Poolable> Pooled<T> {
    /// Take ownership of a published record whose count is one
    pub(crate) fn from_box(record: Box<T>) -> Self {
        debug_assert_eq!(record.refcnt().get(), 1);
        Self {
            ptr: NonNull::from(Box::leak(record)),
            _owns: PhantomData,
        }
    }

    #[inline]
    fn record(&self) -> &T {
        // SAFETY: this handle holds a reference, so the record is live and is
        // only mutated through `get_mut`, which requires it to be the sole one
        // and leaves the count and link alone.
        unsafe { self.ptr.as_ref() }
    }

    /// Add a reference and return a handle that owns it
    #[inline]
    pub fn retain(this: &Self) -> Self {
        this.record().refcnt().retain();
        Self {
            ptr: this.ptr,
            _owns: PhantomData,
        }
    }

    /// Give up this reference
    ///
    /// The last release returns the record to its home pool.
    #[inline]
    pub fn release(this: Self) {
        drop(this);
    }

    /// Current number of references to the record
    #[inline]
    pub fn ref_count(this: &Self) -> usize {
        this.record().refcnt().get()
    }

    /// `true` if both handles refer to the same record
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Address of the record
    #[inline]
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }

    /// Mutable access when this is the only reference
    ///
    /// # Safety
    ///
    /// The returned reference covers the record's embedded count and pool
    /// link as well as its payload. The caller must leave both as they are:
    /// no whole-record assignment, `mem::swap` or `mem::take`, and no writes
    /// through [`Poolable::refcnt`] or [`Poolable::pool_link_mut`]. Only
    /// payload fields may be written.
    #[inline]
    pub unsafe fn get_mut(this: &mut Self) -> Option<&mut T> {
        if this.record().refcnt().is_unique() {
            // SAFETY: the count is one and this handle owns it, so no other
            // reference exists and none can be made while `this` is borrowed.
            Some(unsafe { this.ptr.as_mut() })
        } else {
            None
        }
    }
}

impl<T: Poolable> Clone for Pooled<T> {
    fn clone(&self) -> Self {
        Self::retain(self)
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if !self.record().refcnt().release() {
            return;
        }

        // SAFETY: this drop took the count to zero after an acquire fence, so
        // every other handle is gone and their accesses happened-before this
        // point. The pointer came from `Box::leak` in `from_box`.
        let record = unsafe { Box::from_raw(self.ptr.as_ptr()) };
        return_record(record);
    }
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.record()
    }
}

impl<T: Poolable> AsRef<T> for Pooled<T> {
    fn as_ref(&self) -> &T {
        self.record()
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.record(), f)
    }
}
