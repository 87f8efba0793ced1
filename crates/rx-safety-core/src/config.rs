//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Severity;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tunables of the decision engine and its catalog plumbing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single catalog provider fetch
    pub catalog_fetch_timeout_ms: u64,
    /// Minimum similarity accepted by fuzzy name matching
    pub fuzzy_match_threshold: f64,
    pub max_recommendations_per_drug: usize,
    /// Interactions at or above this severity trigger substitution search
    pub substitution_severity: Severity,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_fetch_timeout_ms: 5000,
            fuzzy_match_threshold: 0.85,
            max_recommendations_per_drug: 5,
            substitution_severity: Severity::Moderate,
            log_filter: "rx_safety_core=info,rx_safety_intake=info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config; missing keys take defaults.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.catalog_fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "catalog_fetch_timeout_ms must be positive".to_string(),
            ));
        }
        if !(self.fuzzy_match_threshold > 0.0 && self.fuzzy_match_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "fuzzy_match_threshold must be in (0, 1], got {}",
                self.fuzzy_match_threshold
            )));
        }
        if self.substitution_severity == Severity::None {
            return Err(ConfigError::Invalid(
                "substitution_severity must be above NONE".to_string(),
            ));
        }
        Ok(())
    }

    pub fn catalog_fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.catalog_fetch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.catalog_fetch_timeout().as_millis(), 5000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"max_recommendations_per_drug": 2}"#).unwrap();
        assert_eq!(config.max_recommendations_per_drug, 2);
        assert_eq!(config.substitution_severity, Severity::Moderate);
    }

    #[test]
    fn test_severity_parsed_uppercase() {
        let config = EngineConfig::from_json_str(r#"{"substitution_severity": "SEVERE"}"#).unwrap();
        assert_eq!(config.substitution_severity, Severity::Severe);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"catalog_fetch_timeout_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"fuzzy_match_threshold": 1.5}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"substitution_severity": "NONE"}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"fuzzy_match_threshold": 0.9}"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.fuzzy_match_threshold, 0.9);
        assert!(matches!(
            EngineConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
