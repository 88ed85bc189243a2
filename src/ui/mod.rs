//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//! - [`progress`] - Terminal progress bar
//!
//! # Design
//!
//! All terminal output goes through this module. Progress bars draw on
//! stderr; results and task messages go to stdout.

pub mod output;
pub mod progress;
