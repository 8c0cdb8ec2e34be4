//! Trait for records that can be pooled

use super::PoolLink;
use crate::refcount::RefCount;

/// Trait for records that live in a [`ProconPool`](super::ProconPool)
///
/// A poolable record embeds its own reference count and pool linkage. Both
/// are plain fields of the record; implementations only say where they are.
/// [`impl_poolable!`](crate::impl_poolable) writes the accessors for you.
///
/// # Safety
///
/// [`Pooled`](super::Pooled) frees a record when the count returned by
/// [`refcnt`](Poolable::refcnt) reaches zero and sends it to the pool found
/// through [`pool_link`](Poolable::pool_link). Implementations must therefore
/// return references to fields embedded in `self`, and the same fields on
/// every call. `pool_link_mut` must return the field `pool_link` reads.
/// `reset` and `is_reusable` may touch any field.
///
/// A safe implementation is rejected:
///
/// ```compile_fail,E0200
/// use kvpool::pool::{PoolLink, Poolable};
/// use kvpool::RefCount;
///
/// #[derive(Default)]
/// struct Loose {
///     refcnt: RefCount,
///     pm: PoolLink<Loose>,
/// }
///
/// impl Poolable for Loose {
///     fn refcnt(&self) -> &RefCount {
///         &self.refcnt
///     }
///     fn pool_link(&self) -> &PoolLink<Self> {
///         &self.pm
///     }
///     fn pool_link_mut(&mut self) -> &mut PoolLink<Self> {
///         &mut self.pm
///     }
/// }
/// ```
///
/// # Example
/// ```
/// use kvpool::impl_poolable;
/// use kvpool::pool::PoolLink;
/// use kvpool::RefCount;
///
/// #[derive(Default)]
/// struct Session {
///     id: u64,
///     refcnt: RefCount,
///     pm: PoolLink<Session>,
/// }
///
/// impl_poolable!(Session, refcnt, pm);
/// ```
pub unsafe trait Poolable: Send + Sync + Sized + 'static {
    /// The record's embedded reference count
    fn refcnt(&self) -> &RefCount;

    /// The record's embedded pool linkage
    fn pool_link(&self) -> &PoolLink<Self>;

    /// Mutable access to the pool linkage, used while the record is unshared
    fn pool_link_mut(&mut self) -> &mut PoolLink<Self>;

    /// Reset record state before it goes back on the free list
    ///
    /// Payload fields may be left as they are: every acquire initializes them
    /// again.
    fn reset(&mut self) {}

    /// Check if record is reusable
    ///
    /// Return false if the record should be freed instead of cached.
    fn is_reusable(&self) -> bool {
        true
    }
}

/// Bind a record type to the pool machinery by naming its embedded fields
///
/// The first form takes the type, its [`RefCount`](crate::RefCount) field and
/// its [`PoolLink`](crate::pool::PoolLink) field. The second form adds a
/// `reset` function run when a record is checked back into its pool.
///
/// The generated accessors project straight onto the named fields, which is
/// what the `unsafe impl` of [`Poolable`](crate::pool::Poolable) requires.
/// A field that only derefs to a count is rejected:
///
/// ```compile_fail
/// use kvpool::impl_poolable;
/// use kvpool::pool::PoolLink;
/// use kvpool::RefCount;
///
/// struct Borrowed {
///     refcnt: &'static RefCount,
///     pm: PoolLink<Borrowed>,
/// }
///
/// impl_poolable!(Borrowed, refcnt, pm);
/// ```
///
/// # Examples
/// ```
/// use kvpool::impl_poolable;
/// use kvpool::pool::PoolLink;
/// use kvpool::RefCount;
///
/// #[derive(Default)]
/// struct Frame {
///     bytes: Vec<u8>,
///     refs: RefCount,
///     link: PoolLink<Frame>,
/// }
///
/// impl_poolable!(Frame, refs, link, reset = |frame: &mut Frame| frame.bytes.clear());
/// ```
#[macro_export]
macro_rules! impl_poolable {
    (@bind $type:ty, $refcnt:ident, $link:ident, { $($extra:tt)* }) => {
        // Raw pointers do not deref-coerce, so the fields must be a
        // `RefCount` and a `PoolLink` themselves.
        const _: fn(&$type) -> (*const $crate::RefCount, *const $crate::pool::PoolLink<$type>) =
            |record| (&raw const record.$refcnt, &raw const record.$link);

        // SAFETY: the accessors return the named fields of `self`.
        #[allow(unsafe_code)]
        unsafe impl $crate::pool::Poolable for $type {
            #[inline]
            fn refcnt(&self) -> &$crate::RefCount {
                &self.$refcnt
            }

            #[inline]
            fn pool_link(&self) -> &$crate::pool::PoolLink<Self> {
                &self.$link
            }

            #[inline]
            fn pool_link_mut(&mut self) -> &mut $crate::pool::PoolLink<Self> {
                &mut self.$link
            }

            $($extra)*
        }
    };
    ($type:ty, $refcnt:ident, $link:ident) => {
        $crate::impl_poolable!(@bind $type, $refcnt, $link, {});
    };
    ($type:ty, $refcnt:ident, $link:ident, reset = $reset:expr) => {
        $crate::impl_poolable!(@bind $type, $refcnt, $link, {
            fn reset(&mut self) {
                let reset: fn(&mut Self) = $reset;
                reset(self);
            }
        });
    };
}
