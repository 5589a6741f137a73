//! Configuration models and loading.
//!
//! This crate owns the JARO config schema, JSON5 loading, environment
//! overrides, and validation used by the server binary and the SDK facade.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Configuration schema models.
pub use model::*;
/// Default config filename.
pub use loader::DEFAULT_CONFIG_FILE;
