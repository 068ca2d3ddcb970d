//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use crate::task::DEFAULT_MAX_RETRIES;
use std::time::Duration;

/// Storage key the queue snapshot lives under by default.
pub const DEFAULT_STORAGE_KEY: &str = "maintenance_sync_queue";

/// Default time between periodic drain cycles.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time between periodic drain cycles.
    pub drain_interval: Duration,
    /// Retry budget for tasks enqueued without an explicit one.
    pub default_max_retries: u32,
    /// Slot key holding the persisted queue.
    pub storage_key: String,
    /// Whether `enqueue` attempts a drain right away.
    pub drain_on_enqueue: bool,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            default_max_retries: DEFAULT_MAX_RETRIES,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            drain_on_enqueue: true,
        }
    }

    /// Sets the periodic drain interval.
    pub fn with_drain_interval(mut self, interval: Duration) -> Self {
        self.drain_interval = interval;
        self
    }

    /// Sets the default retry budget.
    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    /// Sets the storage key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Enables or disables the immediate drain after `enqueue`.
    pub fn with_drain_on_enqueue(mut self, enabled: bool) -> Self {
        self.drain_on_enqueue = enabled;
        self
    }

    /// Checks that the configuration can drive an engine.
    pub fn validate(&self) -> SyncResult<()> {
        if self.drain_interval.is_zero() {
            return Err(SyncError::InvalidConfig(
                "drain interval must be greater than zero".into(),
            ));
        }
        if self.default_max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "default retry budget must be at least 1".into(),
            ));
        }
        if self.storage_key.is_empty() {
            return Err(SyncError::InvalidConfig("storage key must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.drain_interval, Duration::from_secs(30));
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.storage_key, "maintenance_sync_queue");
        assert!(config.drain_on_enqueue);
        config.validate().unwrap();
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_drain_interval(Duration::from_secs(5))
            .with_default_max_retries(7)
            .with_storage_key("offline_queue")
            .with_drain_on_enqueue(false);

        assert_eq!(config.drain_interval, Duration::from_secs(5));
        assert_eq!(config.default_max_retries, 7);
        assert_eq!(config.storage_key, "offline_queue");
        assert!(!config.drain_on_enqueue);
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let zero_interval = SyncConfig::new().with_drain_interval(Duration::ZERO);
        assert!(matches!(
            zero_interval.validate(),
            Err(SyncError::InvalidConfig(_))
        ));

        let zero_budget = SyncConfig::new().with_default_max_retries(0);
        assert!(zero_budget.validate().is_err());

        let empty_key = SyncConfig::new().with_storage_key("");
        assert!(empty_key.validate().is_err());
    }
}
