//! CLI configuration handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL every request path is resolved against.
    pub base_url: String,

    /// Path of the refresh endpoint, relative to `base_url`.
    pub refresh_path: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Logging level.
    pub log_level: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/".to_string(),
            refresh_path: "auth/refresh".to_string(),
            timeout_secs: 30,
            log_level: "info".to_string(),
            config_path: PathBuf::new(),
        }
    }
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings the HTTP stack cannot be built from.
    pub fn validate(&self) -> Result<()> {
        tokenrelay_core::http::parse_base_url(&self.base_url)
            .with_context(|| format!("Invalid base_url in {:?}", self.config_path))?;

        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Load configuration from an explicit path, or the default location.
pub fn load_config(explicit: Option<&Path>) -> Result<RelayConfig> {
    let config_path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path(),
    };
    load_from_path(&config_path)
}

/// Load configuration from `path`, falling back to defaults if it doesn't exist.
pub fn load_from_path(path: &Path) -> Result<RelayConfig> {
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?
    } else {
        RelayConfig::default()
    };

    config.config_path = path.to_path_buf();
    Ok(config)
}

fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("tokenrelay.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tokenrelay", "tokenrelay")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/api/");
        assert_eq!(config.refresh_path, "auth/refresh");
        assert_eq!(config.config_path, path);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"https://api.example.com/v2\"\ntimeout_secs = 5\n")
            .unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.base_url, "https://api.example.com/v2");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = [").unwrap();

        assert!(load_from_path(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RelayConfig {
            base_url: "not a url".to_string(),
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            timeout_secs: 0,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
