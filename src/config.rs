use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SorloadError};
use crate::fetch::FetchConfig;
use crate::persist::{DuplicatePolicy, DEFAULT_CHUNK_SIZE};

/// Where the daily dumps are published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Scheme and host, without a trailing slash
    pub base_url: String,
    /// File name prefix before the `-YYYY-MM-DD-full.zip` suffix
    pub prefix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dsa-sor-data-dumps.s3.eu-central-1.amazonaws.com".to_string(),
            prefix: "sor-discord-netherlands-bv".to_string(),
        }
    }
}

/// Configuration for an import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorloadConfig {
    pub database: PathBuf,
    pub source: SourceConfig,
    pub workers: usize,
    pub chunk_size: usize,
    pub duplicates: DuplicatePolicy,
    pub fetch: FetchConfig,
}

impl Default for SorloadConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("sorload.db"),
            source: SourceConfig::default(),
            workers: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
            duplicates: DuplicatePolicy::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl SorloadConfig {
    /// Load from a YAML file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path)?;
                Self::from_yaml(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SorloadError::Config("workers must be at least 1".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(SorloadError::Config("chunk_size must be at least 1".to_string()));
        }
        if self.source.base_url.trim().is_empty() {
            return Err(SorloadError::Config("source.base_url is empty".to_string()));
        }
        if self.source.prefix.trim().is_empty() {
            return Err(SorloadError::Config("source.prefix is empty".to_string()));
        }
        self.fetch.backoff.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SorloadConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.duplicates, DuplicatePolicy::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = SorloadConfig::from_yaml(
            "workers: 4\nduplicates: always-overwrite\nfetch:\n  backoff:\n    max_attempts: 3\n",
        )
        .unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.duplicates, DuplicatePolicy::AlwaysOverwrite);
        assert_eq!(config.fetch.backoff.max_attempts, 3);
        assert_eq!(config.fetch.backoff.initial_interval_ms, 500);
        assert_eq!(config.source, SourceConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sorload.yaml");
        fs::write(&path, "database: /tmp/x.db\nsource:\n  prefix: sor-other\n").unwrap();

        let config = SorloadConfig::load(Some(&path)).unwrap();
        assert_eq!(config.database, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.source.prefix, "sor-other");
        assert_eq!(config.source.base_url, SourceConfig::default().base_url);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let err = SorloadConfig::load(Some(&tmp.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, SorloadError::Io(_)));
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let err = SorloadConfig::from_yaml("workers: [").unwrap_err();
        assert!(matches!(err, SorloadError::Yaml(_)));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = SorloadConfig {
            workers: 0,
            ..SorloadConfig::default()
        };
        assert!(matches!(config.validate(), Err(SorloadError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_infinite_jitter() {
        let config =
            SorloadConfig::from_yaml("fetch:\n  backoff:\n    randomization_factor: .inf\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("randomization_factor"));
    }

    #[test]
    fn test_validate_rejects_shrinking_multiplier() {
        let config = SorloadConfig::from_yaml("fetch:\n  backoff:\n    multiplier: 0.5\n").unwrap();
        assert!(matches!(config.validate(), Err(SorloadError::Config(_))));

        let config = SorloadConfig::from_yaml("fetch:\n  backoff:\n    multiplier: .nan\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = SorloadConfig {
            chunk_size: 0,
            ..SorloadConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
