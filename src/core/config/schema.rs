//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order:
//! 1. `$SHOP_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/shopcli/config.toml`
//! 3. `~/.shopcli/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing so that a bad shop id or API
//! base is reported against the file it came from, not at request time.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{LengthUnit, ShopId, WeightUnit};

/// Smallest poll interval accepted from configuration.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// On-disk configuration.
///
/// # Example
///
/// ```toml
/// shop_id = "48213"
/// api_base = "https://api.example-commerce.com/v1"
///
/// [polling]
/// interval_ms = 1000
/// timeout_secs = 3600
///
/// [display]
/// progress = true
///
/// [units]
/// length = "cm"
/// weight = "kg"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Default shop used when `--shop-id` is not given
    pub shop_id: Option<String>,

    /// API base URL
    pub api_base: Option<String>,

    /// Task polling settings
    pub polling: Option<PollingConfig>,

    /// Terminal display settings
    pub display: Option<DisplayConfig>,

    /// Default import units
    pub units: Option<UnitsConfig>,
}

/// Task polling settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    /// Delay between task lookups, in milliseconds
    pub interval_ms: Option<u64>,

    /// Give up waiting for a task after this many seconds
    pub timeout_secs: Option<u64>,
}

/// Terminal display settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Render progress bars on stderr
    pub progress: Option<bool>,
}

/// Default units for product imports.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UnitsConfig {
    pub length: Option<LengthUnit>,
    pub weight: Option<WeightUnit>,
}

/// Keys accepted by `shop config get/set`.
pub const KNOWN_KEYS: &[&str] = &[
    "shop_id",
    "api_base",
    "polling.interval_ms",
    "polling.timeout_secs",
    "display.progress",
    "units.length",
    "units.weight",
];

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(shop_id) = &self.shop_id {
            ShopId::new(shop_id.as_str())
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }

        if let Some(api_base) = &self.api_base {
            validate_api_base(api_base)?;
        }

        if let Some(interval) = self.polling.as_ref().and_then(|p| p.interval_ms) {
            if interval < MIN_POLL_INTERVAL_MS {
                return Err(ConfigError::InvalidValue(format!(
                    "polling.interval_ms must be at least {}, got {}",
                    MIN_POLL_INTERVAL_MS, interval
                )));
            }
        }

        if let Some(0) = self.polling.as_ref().and_then(|p| p.timeout_secs) {
            return Err(ConfigError::InvalidValue(
                "polling.timeout_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Get a value by dotted key, formatted for display.
    ///
    /// Returns `Ok(None)` when the key is known but unset.
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let value = match key {
            "shop_id" => self.shop_id.clone(),
            "api_base" => self.api_base.clone(),
            "polling.interval_ms" => self
                .polling
                .as_ref()
                .and_then(|p| p.interval_ms)
                .map(|v| v.to_string()),
            "polling.timeout_secs" => self
                .polling
                .as_ref()
                .and_then(|p| p.timeout_secs)
                .map(|v| v.to_string()),
            "display.progress" => self
                .display
                .as_ref()
                .and_then(|d| d.progress)
                .map(|v| v.to_string()),
            "units.length" => self
                .units
                .as_ref()
                .and_then(|u| u.length)
                .map(|v| v.to_string()),
            "units.weight" => self
                .units
                .as_ref()
                .and_then(|u| u.weight)
                .map(|v| v.to_string()),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// Set a value by dotted key, parsing it into the field's type.
    ///
    /// The whole file is re-validated after the change.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "shop_id" => self.shop_id = Some(value.trim().to_string()),
            "api_base" => self.api_base = Some(value.trim().to_string()),
            "polling.interval_ms" => {
                self.polling.get_or_insert_with(Default::default).interval_ms =
                    Some(parse_number(key, value)?)
            }
            "polling.timeout_secs" => {
                self.polling.get_or_insert_with(Default::default).timeout_secs =
                    Some(parse_number(key, value)?)
            }
            "display.progress" => {
                let flag = value.trim().parse::<bool>().map_err(|_| {
                    ConfigError::InvalidValue(format!("{} expects true or false", key))
                })?;
                self.display.get_or_insert_with(Default::default).progress = Some(flag);
            }
            "units.length" => {
                let unit = value
                    .parse::<LengthUnit>()
                    .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
                self.units.get_or_insert_with(Default::default).length = Some(unit);
            }
            "units.weight" => {
                let unit = value
                    .parse::<WeightUnit>()
                    .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
                self.units.get_or_insert_with(Default::default).weight = Some(unit);
            }
            _ => return Err(unknown_key(key)),
        }
        self.validate()
    }
}

fn validate_api_base(api_base: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(api_base)
        .map_err(|e| ConfigError::InvalidValue(format!("invalid api_base '{}': {}", api_base, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue(format!(
            "api_base must use http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} expects a whole number", key)))
}

fn unknown_key(key: &str) -> ConfigError {
    ConfigError::InvalidValue(format!(
        "unknown configuration key '{}', expected one of: {}",
        key,
        KNOWN_KEYS.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            shop_id = "48213"
            api_base = "https://api.example.test/v1"

            [polling]
            interval_ms = 500
            timeout_secs = 60

            [display]
            progress = false

            [units]
            length = "in"
            weight = "lb"
            "#,
        )
        .unwrap();

        file.validate().unwrap();
        assert_eq!(file.shop_id.as_deref(), Some("48213"));
        assert_eq!(file.polling.as_ref().unwrap().interval_ms, Some(500));
        assert_eq!(file.units.as_ref().unwrap().length, Some(LengthUnit::In));
        assert_eq!(file.units.as_ref().unwrap().weight, Some(WeightUnit::Lb));
    }

    #[test]
    fn rejects_unknown_unit() {
        let result: Result<ConfigFile, _> = toml::from_str(
            r#"
            [units]
            weight = "stone"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_tiny_poll_interval() {
        let file = ConfigFile {
            polling: Some(PollingConfig {
                interval_ms: Some(10),
                timeout_secs: None,
            }),
            ..Default::default()
        };
        assert!(file.validate().is_err());
    }

    #[test]
    fn rejects_non_http_api_base() {
        let file = ConfigFile {
            api_base: Some("ftp://example.test".into()),
            ..Default::default()
        };
        assert!(file.validate().is_err());
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut file = ConfigFile::default();
        file.set("shop_id", "991").unwrap();
        file.set("polling.interval_ms", "250").unwrap();
        file.set("display.progress", "false").unwrap();
        file.set("units.length", "MM").unwrap();

        assert_eq!(file.get("shop_id").unwrap().as_deref(), Some("991"));
        assert_eq!(
            file.get("polling.interval_ms").unwrap().as_deref(),
            Some("250")
        );
        assert_eq!(file.get("display.progress").unwrap().as_deref(), Some("false"));
        assert_eq!(file.get("units.length").unwrap().as_deref(), Some("mm"));
        assert_eq!(file.get("units.weight").unwrap(), None);
    }

    #[test]
    fn set_rejects_invalid_values() {
        let mut file = ConfigFile::default();
        assert!(file.set("shop_id", "a b").is_err());
        assert!(file.set("polling.timeout_secs", "soon").is_err());
        assert!(file.set("display.progress", "maybe").is_err());
        assert!(file.set("colour", "blue").is_err());
    }
}
