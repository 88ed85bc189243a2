//! api
//!
//! Client for the hosted e-commerce REST API.
//!
//! # Architecture
//!
//! The [`Platform`] trait is the seam between the core operations (task
//! polling, file transfer, bulk export/import) and the network. Core code
//! only ever sees `&dyn Platform`, so tests run against [`mock::MockPlatform`]
//! while the CLI wires in [`RestPlatform`].
//!
//! # Modules
//!
//! - `traits`: `Platform` trait, `ApiError` and wire types
//! - [`request`]: `METHOD:path` selector request builder
//! - [`rest`]: REST implementation
//! - [`mock`]: Mock implementation for deterministic testing

pub mod mock;
pub mod request;
pub mod rest;
mod traits;

pub use rest::RestPlatform;
pub use traits::*;
