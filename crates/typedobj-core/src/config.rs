//! Engine configuration.
//!
//! Loaded from YAML, then overridden by environment variables:
//! - `TYPEDOBJ_SORT_BUDGET`: key-sorting memory budget in bytes
//! - `TYPEDOBJ_MAX_IDS`: maximum unique ID references per object
//! - `TYPEDOBJ_TEMP_DIR`: spool directory; setting it selects disk mode

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default key-sorting memory budget: 100 MiB.
pub const DEFAULT_SORT_BUDGET: u64 = 100 * 1024 * 1024;

/// Default maximum number of unique ID references per object.
pub const DEFAULT_MAX_UNIQUE_IDS: u64 = 100_000;

fn default_sort_budget() -> u64 {
    DEFAULT_SORT_BUDGET
}

fn default_max_unique_ids() -> u64 {
    DEFAULT_MAX_UNIQUE_IDS
}

/// Tunables for a validation / canonicalization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bytes the sorter may spend holding object keys.
    #[serde(default = "default_sort_budget")]
    pub sort_budget_bytes: u64,

    /// Unique `(id type, id)` pairs tolerated per object.
    #[serde(default = "default_max_unique_ids")]
    pub max_unique_ids: u64,

    /// Directory for spooled payloads. `None` keeps everything in memory.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sort_budget_bytes: DEFAULT_SORT_BUDGET,
            max_unique_ids: DEFAULT_MAX_UNIQUE_IDS,
            temp_dir: None,
        }
    }
}

impl EngineConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text, &path.display().to_string())
    }

    /// Load from an optional file, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        base.with_env_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("TYPEDOBJ_SORT_BUDGET") {
            self.sort_budget_bytes = parse_env("TYPEDOBJ_SORT_BUDGET", value)?;
        }
        if let Some(value) = lookup("TYPEDOBJ_MAX_IDS") {
            self.max_unique_ids = parse_env("TYPEDOBJ_MAX_IDS", value)?;
        }
        if let Some(value) = lookup("TYPEDOBJ_TEMP_DIR") {
            self.temp_dir = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        Ok(self)
    }
}

fn parse_env(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EngineConfig::from_yaml_str("max_unique_ids: 5\n", "inline").unwrap();
        assert_eq!(config.max_unique_ids, 5);
        assert_eq!(config.sort_budget_bytes, DEFAULT_SORT_BUDGET);
        assert_eq!(config.temp_dir, None);
    }

    #[test]
    fn test_env_overrides_win() {
        let config = EngineConfig::default()
            .with_env_overrides(|var| match var {
                "TYPEDOBJ_SORT_BUDGET" => Some("144".into()),
                "TYPEDOBJ_TEMP_DIR" => Some("/tmp/spool".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.sort_budget_bytes, 144);
        assert_eq!(config.temp_dir, Some(PathBuf::from("/tmp/spool")));
        assert_eq!(config.max_unique_ids, DEFAULT_MAX_UNIQUE_IDS);
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let err = EngineConfig::default()
            .with_env_overrides(|var| (var == "TYPEDOBJ_MAX_IDS").then(|| "lots".to_string()))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value 'lots' for environment variable TYPEDOBJ_MAX_IDS"
        );
    }

    #[test]
    fn test_bad_yaml_rejected() {
        assert!(matches!(
            EngineConfig::from_yaml_str("sort_budget_bytes: [1]", "inline"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "sort_budget_bytes: 2048\ntemp_dir: /var/spool\n").unwrap();
        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.sort_budget_bytes, 2048);
        assert_eq!(config.temp_dir, Some(PathBuf::from("/var/spool")));
    }
}
