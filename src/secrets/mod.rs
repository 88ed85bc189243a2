//! secrets
//!
//! Storage for API tokens.
//!
//! # Design
//!
//! Tokens are keyed by API host, so pointing `api_base` at a staging server
//! never sends the production token there. The only implementation is
//! [`FileSecretStore`], which keeps `~/.shopcli/secrets.toml` at mode 0600.
//!
//! Token values never appear in logs or error messages.
//!
//! # Example
//!
//! ```ignore
//! use shopcli::secrets::{FileSecretStore, SecretStore, token_key};
//!
//! let store = FileSecretStore::new()?;
//! let key = token_key("https://api.example-commerce.com/v1")?;
//! store.set(&key, "tok_live_...")?;
//! ```

mod file_store;

pub use file_store::FileSecretStore;

use chrono::{DateTime, Utc};
use reqwest::Url;
use thiserror::Error;

/// Errors from secret storage operations.
///
/// Messages never include secret values.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to read secrets: {0}")]
    ReadError(String),

    #[error("failed to write secrets: {0}")]
    WriteError(String),

    #[error("invalid secret key: {0}")]
    InvalidKey(String),
}

/// A stored token with the time it was saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

/// Key-value storage for tokens.
pub trait SecretStore: Send + Sync {
    /// Look up a token. `Ok(None)` when nothing is stored.
    fn get(&self, key: &str) -> Result<Option<StoredToken>, SecretError>;

    /// Store a token, replacing any previous value.
    fn set(&self, key: &str, token: &str) -> Result<(), SecretError>;

    /// Remove a token. Returns whether one was stored.
    fn delete(&self, key: &str) -> Result<bool, SecretError>;
}

/// Key under which the token for an API base is stored.
///
/// The key is the host, plus the port when one is given explicitly.
pub fn token_key(api_base: &str) -> Result<String, SecretError> {
    let url = Url::parse(api_base)
        .map_err(|e| SecretError::InvalidKey(format!("'{}': {}", api_base, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| SecretError::InvalidKey(format!("'{}' has no host", api_base)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
