//! Statistics tracking for record pools
//!
//! Counters are relaxed atomics: they are updated from every thread that
//! touches a pool and carry no ordering guarantees between each other.

use core::fmt;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Statistics for pool operations
#[derive(Debug, Default)]
pub struct PoolStats {
    // Acquire path
    pub(crate) gets: AtomicU64,
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) failures: AtomicU64,

    // Return path
    pub(crate) returns: AtomicU64,

    // Allocation tracking
    pub(crate) creates: AtomicU64,
    pub(crate) destroys: AtomicU64,

    // Occupancy
    pub(crate) live: AtomicUsize,
    pub(crate) peak_live: AtomicUsize,
    pub(crate) allocated: AtomicUsize,
    pub(crate) peak_allocated: AtomicUsize,
}

impl PoolStats {
    /// Record an acquire served from the free list
    pub(crate) fn record_hit(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an acquire that had to fall back to allocation
    pub(crate) fn record_miss(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an acquire that returned an error
    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record handed out to a consumer
    pub(crate) fn record_checkout(&self) {
        let live = self.live.fetch_add(1, Ordering::Relaxed) + 1;
        update_peak(&self.peak_live, live);
    }

    /// Record a record coming back from its last release
    pub(crate) fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    /// A fresh record came out of the fallback
    pub(crate) fn record_alloc(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);

        let allocated = self.allocated.fetch_add(1, Ordering::Relaxed) + 1;
        update_peak(&self.peak_allocated, allocated);
    }

    /// A record's memory went back to the allocator
    pub(crate) fn record_free(&self) {
        self.destroys.fetch_add(1, Ordering::Relaxed);
        self.allocated.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = self.gets.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Records currently held by consumers
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Records allocated by the pool and not yet freed, live or cached
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Get total acquires
    pub fn total_gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Get total returns
    pub fn total_returns(&self) -> u64 {
        self.returns.load(Ordering::Relaxed)
    }

    /// Take a point-in-time copy of every counter
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot::from(self)
    }
}

/// Raise `peak` to `value` if it is higher
fn update_peak(peak: &AtomicUsize, value: usize) {
    let mut current = peak.load(Ordering::Relaxed);
    while value > current {
        match peak.compare_exchange_weak(current, value, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// Pool statistics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub total_gets: u64,
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
    pub total_returns: u64,
    pub total_creates: u64,
    pub total_destroys: u64,
    pub live: usize,
    pub peak_live: usize,
    pub allocated: usize,
    pub peak_allocated: usize,
}

impl PoolStatsSnapshot {
    /// Get hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        if self.total_gets == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_gets as f64
        }
    }
}

impl From<&PoolStats> for PoolStatsSnapshot {
    fn from(stats: &PoolStats) -> Self {
        Self {
            total_gets: stats.gets.load(Ordering::Relaxed),
            hits: stats.hits.load(Ordering::Relaxed),
            misses: stats.misses.load(Ordering::Relaxed),
            failures: stats.failures.load(Ordering::Relaxed),
            total_returns: stats.returns.load(Ordering::Relaxed),
            total_creates: stats.creates.load(Ordering::Relaxed),
            total_destroys: stats.destroys.load(Ordering::Relaxed),
            live: stats.live.load(Ordering::Relaxed),
            peak_live: stats.peak_live.load(Ordering::Relaxed),
            allocated: stats.allocated.load(Ordering::Relaxed),
            peak_allocated: stats.peak_allocated.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for PoolStatsSnapshot {
    /// One line, e.g. `gets=4 hit=75.0% fail=0 live=1/2 returned=3 records=2/2`
    ///
    /// `live` and `records` are shown as current/peak.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gets={} hit={:.1}% fail={} live={}/{} returned={} records={}/{}",
            self.total_gets,
            self.hit_rate() * 100.0,
            self.failures,
            self.live,
            self.peak_live,
            self.total_returns,
            self.allocated,
            self.peak_allocated,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = PoolStats::default();
        assert!(stats.hit_rate().abs() < f64::EPSILON);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert!((stats.snapshot().hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_peaks_track_high_water_mark() {
        let stats = PoolStats::default();
        stats.record_alloc();
        stats.record_alloc();
        stats.record_checkout();
        stats.record_checkout();
        stats.record_return();
        stats.record_free();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.live, 1);
        assert_eq!(snapshot.peak_live, 2);
        assert_eq!(snapshot.allocated, 1);
        assert_eq!(snapshot.peak_allocated, 2);
        assert_eq!(snapshot.total_returns, 1);
        assert_eq!(snapshot.total_destroys, 1);
    }

    #[test]
    fn test_display_is_one_line() {
        let stats = PoolStats::default();
        stats.record_miss();
        stats.record_alloc();
        stats.record_checkout();
        assert_eq!(
            stats.snapshot().to_string(),
            "gets=1 hit=0.0% fail=0 live=1/1 returned=0 records=1/1"
        );
    }
}
