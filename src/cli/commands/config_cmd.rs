//! config command - Get, set, or list configuration values

use std::io::Write;

use anyhow::{Context as _, Result};

use crate::core::config::{Config, KNOWN_KEYS};
use crate::ui::output::{self, Verbosity};

/// Get a configuration value.
///
/// Prints nothing for a known key that is unset.
pub fn get(config: &Config, key: &str) -> Result<()> {
    if let Some(value) = config.file.get(key)? {
        println!("{}", value);
    }
    Ok(())
}

/// Set a configuration value and write the config file.
pub fn set(mut config: Config, key: &str, value: &str, verbosity: Verbosity) -> Result<()> {
    config.file.set(key, value)?;
    let path = config.save().context("Failed to write config")?;
    tracing::debug!(path = %path.display(), key, "config written");

    output::print(format!("Set {} = {}", key, value), verbosity);
    Ok(())
}

/// List all configuration values.
pub fn list(config: &Config) -> Result<()> {
    write_list(config, &mut std::io::stdout())
}

fn write_list(config: &Config, out: &mut impl Write) -> Result<()> {
    match config.loaded_from() {
        Some(path) => writeln!(out, "# {}", path.display())?,
        None => writeln!(out, "# (no config file, showing defaults)")?,
    }
    for key in KNOWN_KEYS {
        let value = config
            .file
            .get(key)?
            .unwrap_or_else(|| "(not set)".to_string());
        writeln!(out, "{} = {}", key, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_persists_and_list_shows_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let config = Config::load_from(&path).unwrap();

        set(config, "polling.interval_ms", "250", Verbosity::Quiet).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        let mut out = Vec::new();
        write_list(&reloaded, &mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();

        assert!(listing.contains("polling.interval_ms = 250"));
        assert!(listing.contains("shop_id = (not set)"));
    }

    #[test]
    fn set_rejects_unknown_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let config = Config::load_from(&path).unwrap();

        assert!(set(config, "trunk.branch", "main", Verbosity::Quiet).is_err());
        assert!(!path.exists());
    }
}
