//! core
//!
//! Domain types, configuration, and the per-invocation context.
//!
//! # Modules
//!
//! - [`types`] - Validated identifiers and closed enumerations
//! - [`config`] - Configuration schema and loading
//! - [`context`] - Resolved tenant context threaded into every operation

pub mod config;
pub mod context;
pub mod types;
