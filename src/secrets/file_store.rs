//! secrets::file_store
//!
//! TOML file secret storage.
//!
//! # Security
//!
//! - On Unix the file is created with mode 0600 before any content is written
//! - Writes go to a temp file that is renamed over the original
//!
//! # Format
//!
//! ```toml
//! [tokens."api.example-commerce.com"]
//! token = "..."
//! saved_at = "2026-01-05T10:00:00Z"
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SecretError, SecretStore, StoredToken};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SecretsFile {
    #[serde(default)]
    tokens: BTreeMap<String, TokenEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenEntry {
    token: String,
    saved_at: DateTime<Utc>,
}

/// Secret store backed by `~/.shopcli/secrets.toml`.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Store at the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, SecretError> {
        let home = dirs::home_dir()
            .ok_or_else(|| SecretError::ReadError("cannot determine home directory".into()))?;
        Ok(Self::with_path(home.join(".shopcli/secrets.toml")))
    }

    /// Store at a custom path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<SecretsFile, SecretError> {
        if !self.path.exists() {
            return Ok(SecretsFile::default());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| SecretError::ReadError(format!("cannot read secrets file: {}", e)))?;
        // The toml error may quote the offending line, so only its position is kept.
        toml::from_str(&content).map_err(|e| {
            let at = e
                .span()
                .map(|span| format!(" at byte {}", span.start))
                .unwrap_or_default();
            SecretError::ReadError(format!("cannot parse secrets file{}", at))
        })
    }

    fn store(&self, file: &SecretsFile) -> Result<(), SecretError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SecretError::WriteError(format!("cannot create directory: {}", e)))?;
        }

        let content = toml::to_string_pretty(file)
            .map_err(|e| SecretError::WriteError(format!("cannot serialize secrets: {}", e)))?;

        let temp_path = self.path.with_extension("toml.tmp");
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut temp = options
            .open(&temp_path)
            .map_err(|e| SecretError::WriteError(format!("cannot create temp file: {}", e)))?;
        // `mode` only applies on creation; tighten a leftover temp file too.
        #[cfg(unix)]
        temp.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| SecretError::WriteError(format!("cannot set permissions: {}", e)))?;

        temp.write_all(content.as_bytes())
            .and_then(|_| temp.sync_all())
            .map_err(|e| SecretError::WriteError(format!("cannot write secrets: {}", e)))?;
        drop(temp);

        fs::rename(&temp_path, &self.path)
            .map_err(|e| SecretError::WriteError(format!("cannot replace secrets file: {}", e)))
    }

    /// Whether the file is missing or readable by its owner only.
    #[cfg(unix)]
    pub fn permissions_ok(&self) -> Result<bool, SecretError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.permissions().mode() & 0o077 == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(SecretError::ReadError(format!("cannot stat secrets file: {}", e))),
        }
    }

    #[cfg(not(unix))]
    pub fn permissions_ok(&self) -> Result<bool, SecretError> {
        Ok(true)
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> Result<Option<StoredToken>, SecretError> {
        Ok(self.load()?.tokens.remove(key).map(|entry| StoredToken {
            token: entry.token,
            saved_at: entry.saved_at,
        }))
    }

    fn set(&self, key: &str, token: &str) -> Result<(), SecretError> {
        let mut file = self.load()?;
        file.tokens.insert(
            key.to_string(),
            TokenEntry {
                token: token.to_string(),
                saved_at: Utc::now(),
            },
        );
        self.store(&file)?;
        tracing::debug!(key, "token saved");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, SecretError> {
        let mut file = self.load()?;
        if file.tokens.remove(key).is_none() {
            return Ok(false);
        }
        self.store(&file)?;
        Ok(true)
    }
}
