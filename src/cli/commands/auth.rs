//! cli::commands::auth
//!
//! Store, inspect or remove the API token.
//!
//! # Design
//!
//! - Tokens are stored via [`SecretStore`], keyed by API host
//! - The token value is never printed to stdout or stderr
//! - Without `--token` the token is prompted for without echo, which needs
//!   an interactive terminal
//!
//! # Example
//!
//! ```bash
//! # Interactive (prompts for token)
//! shop auth
//!
//! # Non-interactive
//! shop auth --token tok_live_xxxx
//!
//! # Check status
//! shop auth --status
//!
//! # Remove stored token
//! shop auth --logout
//! ```

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Context as _, Result};

use crate::secrets::{token_key, SecretStore};
use crate::ui::output::{self, Verbosity};

/// Run the auth command against the token slot for `api_base`.
pub fn auth(
    store: &dyn SecretStore,
    api_base: &str,
    token: Option<&str>,
    status: bool,
    logout: bool,
    verbosity: Verbosity,
) -> Result<()> {
    let host = token_key(api_base).context("Invalid API base")?;

    if status {
        return show_status(store, &host, verbosity, &mut io::stdout());
    }

    if logout {
        return do_logout(store, &host, verbosity);
    }

    let token_value = match token {
        Some(t) => t.to_string(),
        None => prompt_token(&host)?,
    };
    validate_token(&token_value)?;

    store
        .set(&host, &token_value)
        .context("Failed to store token")?;

    output::print(format!("Token saved for {}.", host), verbosity);
    Ok(())
}

fn show_status(
    store: &dyn SecretStore,
    host: &str,
    verbosity: Verbosity,
    out: &mut impl Write,
) -> Result<()> {
    let stored = store.get(host).context("Failed to read stored token")?;

    if verbosity == Verbosity::Quiet {
        // Machine-readable output
        writeln!(
            out,
            "{}",
            if stored.is_some() {
                "authenticated"
            } else {
                "not_authenticated"
            }
        )?;
    } else if let Some(stored) = stored {
        writeln!(
            out,
            "Token stored for {} (saved {}).",
            host,
            stored.saved_at.format("%Y-%m-%d %H:%M UTC")
        )?;
    } else {
        writeln!(out, "No token stored for {}.", host)?;
        writeln!(out, "Run 'shop auth' to store one.")?;
    }

    Ok(())
}

fn do_logout(store: &dyn SecretStore, host: &str, verbosity: Verbosity) -> Result<()> {
    let removed = store
        .delete(host)
        .context("Failed to remove stored token")?;

    if removed {
        output::print(format!("Token removed for {}.", host), verbosity);
    } else {
        output::print(format!("No token stored for {}.", host), verbosity);
    }
    Ok(())
}

fn prompt_token(host: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        bail!("Token required. Use --token <TOKEN> or run interactively.");
    }

    eprint!("API token for {}: ", host);
    io::stderr().flush()?;

    let token = rpassword::read_password().context("Failed to read token")?;
    Ok(token.trim().to_string())
}

/// Basic format checks. The token is not verified against the API here.
fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() {
        bail!("Token cannot be empty.");
    }

    if token.len() < 10 {
        bail!("Token appears to be too short.");
    }

    if token.chars().any(char::is_whitespace) {
        bail!("Token should not contain whitespace.");
    }

    Ok(())
}
