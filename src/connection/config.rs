use crate::core::{CoordError, Result};
use crate::storage::DurabilityMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Store configuration
///
/// Built with the builder methods or loaded from JSON:
///
/// ```
/// # use coordtree::StoreConfig;
/// let config = StoreConfig::from_json(r#"{ "max_batch_ops": 64 }"#).unwrap();
/// assert_eq!(config.max_batch_ops, 64);
/// assert_eq!(config.queue_capacity, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Requests that may wait for the writer before submitters block
    pub queue_capacity: usize,

    /// Largest accepted batch
    pub max_batch_ops: usize,

    /// Largest accepted node payload
    pub max_data_bytes: usize,

    /// Change journal location; `None` keeps the store purely in memory
    pub journal_path: Option<PathBuf>,

    /// Flush policy of the change journal
    pub durability: DurabilityMode,
}

impl StoreConfig {
    /// Create a configuration with default limits and no journal
    pub fn new() -> Self {
        Self {
            queue_capacity: 1024,
            max_batch_ops: 1000,
            max_data_bytes: 1024 * 1024,
            journal_path: None,
            durability: DurabilityMode::default(),
        }
    }

    /// Set the writer queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the largest accepted batch
    pub fn max_batch_ops(mut self, max: usize) -> Self {
        self.max_batch_ops = max;
        self
    }

    /// Set the largest accepted node payload
    pub fn max_data_bytes(mut self, max: usize) -> Self {
        self.max_data_bytes = max;
        self
    }

    /// Enable the change journal at `path`
    pub fn journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    /// Set the journal flush policy
    pub fn durability(mut self, mode: DurabilityMode) -> Self {
        self.durability = mode;
        self
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig =
            serde_json::from_str(json).map_err(|e| CoordError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(CoordError::InvalidConfig("queue_capacity must be > 0".to_string()));
        }
        if self.max_batch_ops == 0 {
            return Err(CoordError::InvalidConfig("max_batch_ops must be > 0".to_string()));
        }
        if self.durability == DurabilityMode::Sync && self.journal_path.is_none() {
            return Err(CoordError::InvalidConfig(
                "durability Sync requires a journal_path".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.max_batch_ops, 1000);
        assert_eq!(config.max_data_bytes, 1024 * 1024);
        assert!(config.journal_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StoreConfig::new()
            .queue_capacity(8)
            .max_batch_ops(10)
            .max_data_bytes(64)
            .journal("/tmp/coordtree/journal.log")
            .durability(DurabilityMode::Sync);

        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.max_batch_ops, 10);
        assert_eq!(config.max_data_bytes, 64);
        assert_eq!(config.journal_path, Some(PathBuf::from("/tmp/coordtree/journal.log")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert!(StoreConfig::new().queue_capacity(0).validate().is_err());
        assert!(StoreConfig::new().max_batch_ops(0).validate().is_err());
        assert!(StoreConfig::new().durability(DurabilityMode::Sync).validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let config = StoreConfig::from_json(
            r#"{ "queue_capacity": 16, "journal_path": "data/journal.log", "durability": "Sync" }"#,
        )
        .unwrap();
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.durability, DurabilityMode::Sync);
        assert_eq!(config.max_batch_ops, 1000);

        assert!(StoreConfig::from_json(r#"{ "queue_capacity": 0 }"#).is_err());
        assert!(StoreConfig::from_json("not json").is_err());
    }
}
