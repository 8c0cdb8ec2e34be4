//! Error types for kvpool
//!
//! Uses thiserror for the error enum; constructors log at the point the
//! failure is detected.

use core::alloc::Layout;
use thiserror::Error;
use tracing::{error, warn};

// ============================================================================
// Main Error Types
// ============================================================================

/// Pool and record errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // --- Allocation Errors ---
    #[error("Record allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    // --- Pool Errors ---
    #[error("Record pool '{pool_id}' exhausted (capacity: {capacity})")]
    PoolExhausted { pool_id: String, capacity: usize },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    // --- Process-wide Errors ---
    #[error("Pool defaults already initialized")]
    AlreadyInitialized,
}

impl PoolError {
    /// Check if error is retryable
    ///
    /// An exhausted pool frees up as soon as outstanding records are released.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }

    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "POOL:ALLOC:FAILED",
            Self::PoolExhausted { .. } => "POOL:RECORDS:EXHAUSTED",
            Self::InvalidConfig { .. } => "POOL:CONFIG:INVALID",
            Self::InvalidState { .. } => "POOL:SYSTEM:STATE",
            Self::AlreadyInitialized => "POOL:SYSTEM:INIT",
        }
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        error!(size, align, "record allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create allocation failed error from layout
    pub fn allocation_failed_with_layout(layout: Layout) -> Self {
        Self::allocation_failed(layout.size(), layout.align())
    }

    /// Create pool exhausted error
    pub fn pool_exhausted(pool_id: &str, capacity: usize) -> Self {
        warn!(pool = pool_id, capacity, "record pool exhausted");

        Self::PoolExhausted {
            pool_id: pool_id.to_string(),
            capacity,
        }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }

    /// Create invalid state error
    pub fn invalid_state(reason: &str) -> Self {
        Self::InvalidState {
            reason: reason.to_string(),
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_failed_message() {
        let error = PoolError::allocation_failed(256, 128);
        let message = error.to_string();
        assert!(message.contains("256"));
        assert!(message.contains("128"));
        assert_eq!(error.code(), "POOL:ALLOC:FAILED");
    }

    #[test]
    fn test_error_with_layout() {
        let layout = Layout::from_size_align(192, 64).unwrap();
        let error = PoolError::allocation_failed_with_layout(layout);
        assert_eq!(
            error,
            PoolError::AllocationFailed {
                size: 192,
                align: 64
            }
        );
    }

    #[test]
    fn test_only_exhaustion_is_retryable() {
        assert!(PoolError::pool_exhausted("kv", 8).is_retryable());
        assert!(!PoolError::allocation_failed(8, 8).is_retryable());
        assert!(!PoolError::invalid_config("empty name").is_retryable());
        assert!(!PoolError::AlreadyInitialized.is_retryable());
    }

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            PoolError::allocation_failed(1, 1).code(),
            PoolError::pool_exhausted("kv", 1).code(),
            PoolError::invalid_config("x").code(),
            PoolError::invalid_state("x").code(),
            PoolError::AlreadyInitialized.code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_exhausted_names_pool() {
        let error = PoolError::pool_exhausted("keyvalue", 4);
        assert_eq!(
            error.to_string(),
            "Record pool 'keyvalue' exhausted (capacity: 4)"
        );
    }
}
