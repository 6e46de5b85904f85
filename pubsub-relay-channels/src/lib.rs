//! Ingestion adapters and the publish gateway for pubsub-relay
//!
//! Both ingestion paths append into the same shared [`MessageLog`]; the
//! gateway only talks to the broker.
//!
//! [`MessageLog`]: pubsub_relay_core::MessageLog

pub mod base;
pub mod publish;
pub mod pull;
pub mod push;

pub use base::{ChannelError, PushError, Result};
pub use publish::PublishGateway;
pub use pull::{PullAdapter, PullReport};
pub use push::{PushAdapter, PushReceipt};
