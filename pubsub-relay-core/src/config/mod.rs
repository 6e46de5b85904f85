//! Configuration management
//!
//! Handles loading and validation of pubsub-relay configuration from a
//! JSON file and environment variables.

pub mod loader;
pub mod schema;
pub mod validate;

pub use loader::ConfigLoader;
pub use schema::*;
pub use validate::{validate_config, validate_run_config};
