//! Configuration management for the board client.
//!
//! Loads configuration from ${BOARD_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::pagination::{ROLLBACK_DELAY_MS, ThreadOptions};

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
pub fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for board configuration.
    //!
    //! BOARD_HOME resolution order:
    //! 1. BOARD_HOME environment variable (if set)
    //! 2. ~/.config/board (default)

    use std::path::PathBuf;

    /// Returns the board home directory, if one can be determined.
    pub fn board_home() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("BOARD_HOME") {
            return Some(PathBuf::from(home));
        }
        dirs::home_dir().map(|h| h.join(".config").join("board"))
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> Option<PathBuf> {
        board_home().map(|home| home.join("config.toml"))
    }
}

/// Backend API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the board backend.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: ApiConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8080";
    const DEFAULT_TIMEOUT_SECS: u64 = 15;

    /// Resolves the base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen URL does not parse.
    pub fn resolve_base_url(&self) -> Result<url::Url> {
        self.resolve_base_url_with(std::env::var("BOARD_API_URL").ok().as_deref())
    }

    fn resolve_base_url_with(&self, env_url: Option<&str>) -> Result<url::Url> {
        let chosen = [env_url, self.base_url.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(Self::DEFAULT_BASE_URL);
        url::Url::parse(chosen).with_context(|| format!("Invalid board API base URL: {chosen}"))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive (e.g. "info", "board_core=debug").
    pub filter: Option<String>,
    /// Log file path; stderr when unset.
    pub file: Option<PathBuf>,
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Comments per page
    pub page_size: u32,

    /// Delay before an unconfirmed jump-to-latest is rolled back
    pub reversal_rollback_ms: u64,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: board_types::DEFAULT_PAGE_SIZE,
            reversal_rollback_ms: ROLLBACK_DELAY_MS,
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or is invalid.
    pub fn load() -> Result<Self> {
        match paths::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Writes the commented default template to `path` unless a file exists.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be created.
    pub fn write_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(true)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn rollback_delay(&self) -> Duration {
        Duration::from_millis(self.reversal_rollback_ms)
    }

    /// Thread options derived from this config.
    pub fn thread_options(&self, reversed: bool) -> ThreadOptions {
        ThreadOptions {
            reversed,
            rollback_delay: self.rollback_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();

        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.page_size, 20);
        assert_eq!(config.rollback_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let config: Config = toml::from_str(default_config_template()).unwrap();

        assert_eq!(config.page_size, Config::default().page_size);
        assert_eq!(config.reversal_rollback_ms, 1500);
        assert_eq!(config.api.timeout_secs, 15);
        assert_eq!(config.logging.filter.as_deref(), Some("info"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "page_size = 50\n[api]\nbase_url = \"https://x.test\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.page_size, 50);
        assert_eq!(config.reversal_rollback_ms, 1500);
        assert_eq!(config.api.timeout_secs, 15);
        assert_eq!(config.api.base_url.as_deref(), Some("https://x.test"));
        assert!(config.thread_options(true).reversed);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "page_size = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();

        assert!(format!("{err:#}").contains("page_size"));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "page_size = \"many\"").unwrap();

        let err = Config::load_from(&path).unwrap_err();

        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_write_default_only_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(Config::write_default(&path).unwrap());
        assert!(!Config::write_default(&path).unwrap());
        assert_eq!(Config::load_from(&path).unwrap().page_size, 20);
    }

    #[test]
    fn test_base_url_precedence() {
        let api = ApiConfig {
            base_url: Some("https://config.test/".to_string()),
            ..ApiConfig::default()
        };

        assert_eq!(
            api.resolve_base_url_with(Some("https://env.test/")).unwrap().as_str(),
            "https://env.test/"
        );
        assert_eq!(
            api.resolve_base_url_with(Some("  ")).unwrap().as_str(),
            "https://config.test/"
        );
        assert_eq!(
            ApiConfig::default().resolve_base_url_with(None).unwrap().as_str(),
            "http://localhost:8080/"
        );
        assert!(
            ApiConfig::default()
                .resolve_base_url_with(Some("not a url"))
                .is_err()
        );
    }
}
