//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve flags, environment and config file into a [`crate::core::context::ShopContext`]
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers resolve their inputs, call into
//! [`crate::task`] and [`crate::transfer`] through a `&dyn Platform`, and
//! format the results. Network commands run on a tokio runtime created per
//! invocation, with Ctrl-C wired to a cancellation token.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::Result;

/// Run the CLI application with parsed arguments.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    commands::dispatch(cli.command, &cli.global)
}
