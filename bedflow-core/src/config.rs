//! Runtime configuration.
//!
//! Resolved once at startup and handed to the service; nothing reads the
//! environment during request handling except the log filter fallback.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine and collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lowest accepted priority on admission.
    pub min_priority: i32,
    /// Highest accepted priority on admission.
    pub max_priority: i32,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Emit JSON log lines.
    pub log_json: bool,
    /// Initial waitlist allocation.
    pub waitlist_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_priority: 1,
            max_priority: 10,
            log_filter: "info".to_string(),
            log_json: false,
            waitlist_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_priority <= self.max_priority,
            "min_priority ({}) exceeds max_priority ({})",
            self.min_priority,
            self.max_priority
        );
        Ok(())
    }

    /// Is `priority` inside the configured bounds?
    pub fn accepts_priority(&self, priority: i32) -> bool {
        (self.min_priority..=self.max_priority).contains(&priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.min_priority, 1);
        assert_eq!(config.max_priority, 10);
        assert!(config.accepts_priority(10));
        assert!(!config.accepts_priority(0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_priority": 5, "log_json": true}}"#).unwrap();
        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_priority, 5);
        assert_eq!(config.min_priority, 1);
        assert!(config.log_json);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_priority": 8, "max_priority": 2}}"#).unwrap();
        let err = EngineConfig::from_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
