use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::storage::error::StorageSystemError;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Settings for the plugin manager.
///
/// Layering, lowest to highest precedence: built-in defaults, an optional
/// config file, `GANTRY_*` environment variables, then whatever the caller
/// sets explicitly (the CLI's `--data-dir`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directory holding the install store
    pub data_dir: PathBuf,
    /// Store document name, relative to `data_dir`
    pub store_file: String,
    /// Manifest location inside each plugin repository
    pub manifest_path: String,
    pub resolve_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Upper bound on concurrent resolutions during update checks and update-all
    pub max_concurrent_checks: usize,
    pub git_binary: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_file: constants::DEFAULT_STORE_FILE.to_string(),
            manifest_path: constants::DEFAULT_MANIFEST_PATH.to_string(),
            resolve_timeout_secs: constants::DEFAULT_RESOLVE_TIMEOUT_SECS,
            fetch_timeout_secs: constants::DEFAULT_FETCH_TIMEOUT_SECS,
            max_concurrent_checks: constants::DEFAULT_MAX_CONCURRENT_CHECKS,
            git_binary: constants::DEFAULT_GIT_BINARY.to_string(),
        }
    }
}

/// `$XDG_DATA_HOME/gantry`, else `$HOME/.local/share/gantry`, else `./.gantry`.
pub fn default_data_dir() -> PathBuf {
    if let Some(xdg) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join(constants::DATA_DIR_NAME);
    }
    if let Some(home) = env::var_os("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(constants::DATA_DIR_NAME);
    }
    PathBuf::from(constants::FALLBACK_DATA_DIR)
}

impl ManagerConfig {
    /// Load from a file, picking the format from its extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            StorageSystemError::UnsupportedConfigFormat(path.display().to_string())
        })?;
        if !path.is_file() {
            return Err(StorageSystemError::FileNotFound(path.to_path_buf()).into());
        }
        let contents = fs::read_to_string(path).map_err(|e| Error::io(e, "read_config", path.to_path_buf()))?;
        Self::parse(&contents, format)
    }

    /// Parse configuration text in the given format
    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self> {
        let deserialize_error = |format: &str, e: Box<dyn std::error::Error + Send + Sync>| {
            Error::StorageSystem(StorageSystemError::DeserializationError {
                format: format.to_string(),
                source: e,
            })
        };
        match format {
            ConfigFormat::Json => {
                serde_json::from_str(contents).map_err(|e| deserialize_error("json", Box::new(e)))
            }
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                serde_yaml::from_str(contents).map_err(|e| deserialize_error("yaml", Box::new(e)))
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => {
                toml::from_str(contents).map_err(|e| deserialize_error("toml", Box::new(e)))
            }
        }
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let serialize_error = |format: &str, e: Box<dyn std::error::Error + Send + Sync>| {
            Error::StorageSystem(StorageSystemError::SerializationError {
                format: format.to_string(),
                source: e,
            })
        };
        match format {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| serialize_error("json", Box::new(e)))
            }
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => {
                serde_yaml::to_string(self).map_err(|e| serialize_error("yaml", Box::new(e)))
            }
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| serialize_error("toml", Box::new(e)))
            }
        }
    }

    /// Apply `GANTRY_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(constants::ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(constants::ENV_RESOLVE_TIMEOUT_SECS) {
            self.resolve_timeout_secs = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    constants::ENV_RESOLVE_TIMEOUT_SECS,
                    raw
                ))
            })?;
        }
        if let Some(raw) = lookup(constants::ENV_MAX_CONCURRENT_CHECKS) {
            self.max_concurrent_checks = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    constants::ENV_MAX_CONCURRENT_CHECKS,
                    raw
                ))
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolve_timeout_secs == 0 {
            return Err(Error::Config("resolve_timeout_secs must be greater than zero".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(Error::Config("fetch_timeout_secs must be greater than zero".into()));
        }
        if self.max_concurrent_checks == 0 {
            return Err(Error::Config("max_concurrent_checks must be greater than zero".into()));
        }
        if self.store_file.trim().is_empty() {
            return Err(Error::Config("store_file must not be empty".into()));
        }
        if self.manifest_path.trim().is_empty() {
            return Err(Error::Config("manifest_path must not be empty".into()));
        }
        Ok(())
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }
}
