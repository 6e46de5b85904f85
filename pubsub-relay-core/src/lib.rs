//! Core types and traits for pubsub-relay
//!
//! This crate provides the message types, the bounded message log,
//! configuration loading and logging setup shared by the other
//! pubsub-relay components.

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;

pub use bus::{BoundedLog, Message, MessageLog, PushRequest};
pub use error::{Error, Result};
