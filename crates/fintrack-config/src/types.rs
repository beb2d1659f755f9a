//! Configuration types.
//!
//! Every field is optional in the file so layers can be merged field by
//! field; the accessors supply defaults.
//!
//! ```toml
//! [api]
//! base_url = "https://api.example.com"
//! timeout_secs = 30
//!
//! [storage]
//! dir = "~/.local/share/fintrack"
//!
//! [logging]
//! file = true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Server used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Request timeout used when nothing is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "FINTRACK_API_URL";

const APP_NAME: &str = "fintrack";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FintrackConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl FintrackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: FintrackConfig) {
        self.api.base_url = other.api.base_url.or(self.api.base_url.take());
        self.api.timeout_secs = other.api.timeout_secs.or(self.api.timeout_secs);
        self.storage.dir = other.storage.dir.or(self.storage.dir.take());
        self.logging.file = other.logging.file.or(self.logging.file);
        self.logging.dir = other.logging.dir.or(self.logging.dir.take());
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.is_empty()) {
            self.api.base_url = Some(url);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "api.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// `[api]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl ApiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for persisted session state.
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Configured directory, or the platform data dir (`~/.local/share/fintrack`
    /// on Linux).
    pub fn effective_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
        })
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write JSON logs to a daily-rotated file.
    pub file: Option<bool>,
    /// Log file directory. Defaults to `logs/` under the storage dir.
    pub dir: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn file_enabled(&self) -> bool {
        self.file.unwrap_or(false)
    }

    pub fn effective_dir(&self, storage: &StorageConfig) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| storage.effective_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FintrackConfig::new();
        assert_eq!(config.api.base_url(), "http://localhost:8000");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert!(!config.logging.file_enabled());
        assert!(config.storage.effective_dir().ends_with("fintrack"));
    }

    #[test]
    fn test_parse_partial() {
        let config = FintrackConfig::from_toml(
            r#"
[api]
base_url = "https://api.example.com"
"#,
        )
        .unwrap();
        assert_eq!(config.api.base_url(), "https://api.example.com");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = FintrackConfig::from_toml("[api]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_merge_is_field_level() {
        let mut base = FintrackConfig::from_toml(
            r#"
[api]
base_url = "https://base.example.com"
timeout_secs = 10

[logging]
file = true
"#,
        )
        .unwrap();
        let overlay = FintrackConfig::from_toml("[api]\ntimeout_secs = 5\n").unwrap();

        base.merge(overlay);
        assert_eq!(base.api.base_url(), "https://base.example.com");
        assert_eq!(base.api.timeout(), Duration::from_secs(5));
        assert!(base.logging.file_enabled());
    }

    #[test]
    fn test_env_override() {
        let mut config = FintrackConfig::new();
        config.apply_env_overrides(|name| {
            (name == API_URL_ENV).then(|| "http://staging:8000".to_string())
        });
        assert_eq!(config.api.base_url(), "http://staging:8000");

        // Empty values are ignored.
        config.apply_env_overrides(|_| Some(String::new()));
        assert_eq!(config.api.base_url(), "http://staging:8000");
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = FintrackConfig::new();
        config.storage.dir = Some(PathBuf::from("/tmp/fintrack"));
        let parsed = FintrackConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_log_dir_follows_storage() {
        let mut config = FintrackConfig::new();
        config.storage.dir = Some(PathBuf::from("/data"));
        assert_eq!(
            config.logging.effective_dir(&config.storage),
            PathBuf::from("/data/logs")
        );
    }
}
