//! shopcli - command-line client for a hosted e-commerce platform API
//!
//! Bulk exports and imports run as server-side sharded tasks. This crate
//! starts them, polls them to completion while drawing progress, and moves
//! the files they consume and produce.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, resolves the session)
//! - [`core`] - Domain types, configuration and the per-invocation context
//! - [`api`] - The [`api::Platform`] trait, its REST implementation and a mock
//! - [`task`] - Polling a task until it finishes
//! - [`transfer`] - Streaming downloads and chunked uploads
//! - [`secrets`] - Token storage
//! - [`ui`] - Output formatting and progress bars
//!
//! # Invariants
//!
//! 1. Every request is scoped to the shop id of an explicit context
//! 2. A task lookup failure ends the wait; nothing is retried
//! 3. A failed download never leaves a partial destination file behind
//! 4. API tokens never appear in output or logs

pub mod api;
pub mod cli;
pub mod core;
pub mod secrets;
pub mod task;
pub mod transfer;
pub mod ui;
