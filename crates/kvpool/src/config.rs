//! Pool configuration
//!
//! [`PoolConfig`] describes one pool. A process-wide default, used by the
//! per-thread [`KeyValue`](crate::KeyValue) pools, is installed once through
//! [`crate::init`] and read back with [`defaults`].

use std::borrow::Cow;
use std::sync::OnceLock;

use crate::error::{PoolError, PoolResult};

/// Default pool name
pub const DEFAULT_POOL_NAME: &str = "procon";

/// Configuration for a producer/consumer record pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Name used in log fields and error messages
    pub name: Cow<'static, str>,

    /// Records allocated up front when `pre_warm` is set
    pub initial_capacity: usize,

    /// Maximum records kept on the free list (None for unbounded)
    ///
    /// Records returned while the free list is full are freed.
    pub max_cached: Option<usize>,

    /// Hard limit on records the pool has allocated and not yet freed
    /// (None for unbounded)
    pub max_records: Option<usize>,

    /// Pre-warm pool on creation
    pub pre_warm: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: Cow::Borrowed(DEFAULT_POOL_NAME),
            initial_capacity: 64,
            max_cached: Some(1024),
            max_records: None,
            pre_warm: false,
        }
    }
}

impl PoolConfig {
    /// Create a bounded pool configuration
    ///
    /// The pool never holds more than `capacity` records, live or cached,
    /// and pre-warms all of them.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            initial_capacity: capacity,
            max_cached: Some(capacity),
            max_records: Some(capacity),
            pre_warm: true,
            ..Default::default()
        }
    }

    /// Create an unbounded pool configuration
    pub fn unbounded(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            max_cached: None,
            max_records: None,
            ..Default::default()
        }
    }

    /// Create a builder for configuration
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the initial capacity
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Cap the free list
    pub fn with_max_cached(mut self, max_cached: Option<usize>) -> Self {
        self.max_cached = max_cached;
        self
    }

    /// Cap the number of records the pool may have outstanding
    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    /// Enable or disable pre-warming
    pub fn with_pre_warm(mut self, pre_warm: bool) -> Self {
        self.pre_warm = pre_warm;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> PoolResult<()> {
        if self.name.is_empty() {
            return Err(PoolError::invalid_config("pool name must not be empty"));
        }

        if self.max_records == Some(0) {
            return Err(PoolError::invalid_config("max_records must be > 0"));
        }

        if self.pre_warm {
            if self
                .max_records
                .is_some_and(|max| self.initial_capacity > max)
            {
                return Err(PoolError::invalid_config(
                    "initial_capacity must be <= max_records when pre-warming",
                ));
            }

            if self
                .max_cached
                .is_some_and(|max| self.initial_capacity > max)
            {
                return Err(PoolError::invalid_config(
                    "initial_capacity must be <= max_cached when pre-warming",
                ));
            }
        }

        Ok(())
    }
}

/// Builder for pool configuration
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Create new builder with defaults
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Pool name
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Records to pre-allocate
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Free-list cap
    pub fn max_cached(mut self, max_cached: Option<usize>) -> Self {
        self.config.max_cached = max_cached;
        self
    }

    /// Outstanding record cap
    pub fn max_records(mut self, max_records: Option<usize>) -> Self {
        self.config.max_records = max_records;
        self
    }

    /// Pre-warm on creation
    pub fn pre_warm(mut self, pre_warm: bool) -> Self {
        self.config.pre_warm = pre_warm;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PoolResult<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// Process-wide defaults
static GLOBAL_DEFAULTS: OnceLock<PoolConfig> = OnceLock::new();

/// Install the process-wide default configuration
///
/// Fails with [`PoolError::AlreadyInitialized`] once defaults are set, which
/// includes the implicit initialization done by the first [`defaults`] call.
pub(crate) fn install(config: PoolConfig) -> PoolResult<()> {
    config.validate()?;
    GLOBAL_DEFAULTS
        .set(config)
        .map_err(|_| PoolError::AlreadyInitialized)
}

/// Get the process-wide default configuration
///
/// Falls back to [`PoolConfig::default`] and pins it when nothing was
/// installed.
pub fn defaults() -> &'static PoolConfig {
    GLOBAL_DEFAULTS.get_or_init(PoolConfig::default)
}

/// Check whether process-wide defaults are set
pub fn is_initialized() -> bool {
    GLOBAL_DEFAULTS.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.name, DEFAULT_POOL_NAME);
        assert_eq!(config.max_cached, Some(1024));
        assert!(!config.pre_warm);
    }

    #[test]
    fn test_bounded_config() {
        let config = PoolConfig::bounded(16);
        assert_eq!(config.max_records, Some(16));
        assert_eq!(config.max_cached, Some(16));
        assert!(config.pre_warm);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(PoolConfig::default().with_name("").validate().is_err());
        assert!(
            PoolConfig::default()
                .with_max_records(Some(0))
                .validate()
                .is_err()
        );

        let over_records = PoolConfig::unbounded(32)
            .with_max_records(Some(8))
            .with_pre_warm(true);
        assert!(matches!(
            over_records.validate(),
            Err(PoolError::InvalidConfig { .. })
        ));

        let over_cache = PoolConfig::default()
            .with_initial_capacity(32)
            .with_max_cached(Some(8))
            .with_pre_warm(true);
        assert!(over_cache.validate().is_err());

        // Without pre-warming the initial capacity is only a hint.
        assert!(over_cache.with_pre_warm(false).validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PoolConfig::builder()
            .name("sessions")
            .initial_capacity(8)
            .max_cached(Some(32))
            .max_records(Some(64))
            .pre_warm(true)
            .build()
            .unwrap();

        assert_eq!(config.name, "sessions");
        assert_eq!(config.initial_capacity, 8);
        assert_eq!(config.max_cached, Some(32));
        assert_eq!(config.max_records, Some(64));
        assert!(config.pre_warm);

        let error = PoolConfig::builder().name("").build().unwrap_err();
        assert_eq!(error.code(), "POOL:CONFIG:INVALID");
    }

    #[test]
    fn test_owned_name() {
        let config = PoolConfig::default().with_name(format!("worker-{}", 3));
        assert_eq!(config.name, "worker-3");
    }
}
