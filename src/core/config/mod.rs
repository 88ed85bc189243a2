//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Environment variables and CLI flags (resolved by the CLI layer into
//!    [`crate::core::context::ShopContext`])
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$SHOP_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/shopcli/config.toml`
//! 3. `~/.shopcli/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use shopcli::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("API: {}", config.api_base());
//! println!("Poll every {:?}", config.poll_interval());
//! ```

pub mod schema;

pub use schema::{ConfigFile, DisplayConfig, PollingConfig, UnitsConfig, KNOWN_KEYS};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::types::{LengthUnit, WeightUnit};

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.example-commerce.com/v1";

/// Default delay between task lookups.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "SHOP_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Raw file contents
    pub file: ConfigFile,
    /// Path the file was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// A missing file yields defaults with the path remembered, so that a
    /// subsequent write lands there.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self {
                file: ConfigFile::default(),
                path: Some(path.to_path_buf()),
            });
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.validate()?;

        tracing::debug!(path = %path.display(), "loaded config");

        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Find the first existing config file.
    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            // An explicit override wins even if the file does not exist yet.
            return Some(PathBuf::from(path));
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("shopcli/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let canonical = Self::default_path().ok()?;
        canonical.exists().then_some(canonical)
    }

    /// Get the canonical path for the config file.
    ///
    /// Returns `~/.shopcli/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".shopcli/config.toml"))
    }

    /// Path this config was loaded from, or where it would be written.
    pub fn path(&self) -> Result<PathBuf, ConfigError> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => match std::env::var(CONFIG_ENV) {
                Ok(path) => Ok(PathBuf::from(path)),
                Err(_) => Self::default_path(),
            },
        }
    }

    /// Get the path to the loaded config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref().filter(|p| p.exists())
    }

    /// Write the config file atomically.
    ///
    /// Creates parent directories if needed. Uses atomic write
    /// (write to temp file, then rename) to prevent corruption.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = self.path()?;
        write_config_atomic(&path, &self.file)?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Default shop id, if configured.
    pub fn shop_id(&self) -> Option<&str> {
        self.file.shop_id.as_deref()
    }

    /// API base URL.
    ///
    /// Defaults to [`DEFAULT_API_BASE`].
    pub fn api_base(&self) -> &str {
        self.file.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// Delay between task lookups.
    ///
    /// Defaults to one second.
    pub fn poll_interval(&self) -> Duration {
        self.file
            .polling
            .as_ref()
            .and_then(|p| p.interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// Maximum time to wait for a task, if any.
    ///
    /// Defaults to no limit.
    pub fn task_timeout(&self) -> Option<Duration> {
        self.file
            .polling
            .as_ref()
            .and_then(|p| p.timeout_secs)
            .map(Duration::from_secs)
    }

    /// Whether progress bars are rendered.
    ///
    /// Defaults to `true`.
    pub fn progress(&self) -> bool {
        self.file
            .display
            .as_ref()
            .and_then(|d| d.progress)
            .unwrap_or(true)
    }

    /// Default length unit for imports.
    pub fn length_unit(&self) -> LengthUnit {
        self.file
            .units
            .as_ref()
            .and_then(|u| u.length)
            .unwrap_or_default()
    }

    /// Default weight unit for imports.
    pub fn weight_unit(&self) -> WeightUnit {
        self.file
            .units
            .as_ref()
            .and_then(|u| u.weight)
            .unwrap_or_default()
    }
}

/// Write a config file atomically.
fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    let temp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
