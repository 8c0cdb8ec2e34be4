//! Cache-line geometry and alignment helpers
//!
//! [`CACHE_LINE_SIZE`] is picked per target architecture at compile time. Any
//! type that must sit on its own cache line repeats the same table as
//! `#[cfg_attr(.., repr(align(N)))]` attributes, since `repr(align)` only
//! takes a literal; a const assertion next to such a type checks the two agree.

cfg_if::cfg_if! {
    if #[cfg(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
    ))] {
        /// Cache line size for the target architecture
        ///
        /// x86_64 and aarch64 prefetch cache lines in pairs, so 128 bytes is
        /// the unit that keeps neighbouring records from sharing a line.
        pub const CACHE_LINE_SIZE: usize = 128;
    } else if #[cfg(target_arch = "s390x")] {
        /// Cache line size for the target architecture
        pub const CACHE_LINE_SIZE: usize = 256;
    } else if #[cfg(any(
        target_arch = "arm",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "riscv32",
        target_arch = "sparc",
        target_arch = "hexagon",
    ))] {
        /// Cache line size for the target architecture
        pub const CACHE_LINE_SIZE: usize = 32;
    } else {
        /// Cache line size for the target architecture
        pub const CACHE_LINE_SIZE: usize = 64;
    }
}

const _: () = assert!(CACHE_LINE_SIZE.is_power_of_two());

/// Aligns a value up to the nearest multiple of alignment
///
/// Returns `None` when the rounded value does not fit in a `usize`.
///
/// # Examples
/// ```
/// use kvpool::layout::align_up;
///
/// assert_eq!(align_up(7, 8), Some(8));
/// assert_eq!(align_up(8, 8), Some(8));
/// assert_eq!(align_up(9, 8), Some(16));
/// assert_eq!(align_up(usize::MAX, 8), None);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    match value.checked_add(alignment - 1) {
        Some(bumped) => Some(bumped & !(alignment - 1)),
        None => None,
    }
}

/// Checks if a value is aligned to the given alignment
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Check if a pointer starts on a cache-line boundary
#[inline(always)]
pub fn is_cache_aligned<T>(ptr: *const T) -> bool {
    is_aligned(ptr.addr(), CACHE_LINE_SIZE)
}

/// Number of cache lines a value of `size` bytes spans
#[inline(always)]
pub const fn cache_lines(size: usize) -> usize {
    size.div_ceil(CACHE_LINE_SIZE)
}
