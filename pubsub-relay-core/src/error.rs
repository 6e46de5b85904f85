//! Error types for pubsub-relay

use thiserror::Error;

/// The main error type for pubsub-relay core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration could not be read or resolved
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resolved configuration violates one or more constraints
    #[error("Validation error: {0}")]
    Validation(String),
}

/// A specialized Result type for pubsub-relay core operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
