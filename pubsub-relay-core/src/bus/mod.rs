//! Message types and the bounded message log
//!
//! Both ingestion paths (push webhook and pull subscriber) produce
//! [`Message`] values and append their payloads to one shared
//! [`MessageLog`].

pub mod events;
pub mod log;

pub use events::{Message, PushEnvelopeMessage, PushRequest};
pub use log::{BoundedLog, MessageLog, DEFAULT_LOG_CAPACITY};
