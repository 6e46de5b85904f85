//! Base trait for broker clients

use async_trait::async_trait;
use bytes::Bytes;
use pubsub_relay_core::Message;
use std::collections::HashMap;
use thiserror::Error;

/// Error type for broker operations
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

/// A message to be published to a topic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundMessage {
    pub data: Bytes,
    pub attributes: HashMap<String, String>,
}

impl OutboundMessage {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            attributes: HashMap::new(),
        }
    }

    /// Add an attribute to the message
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A message handed out by a pull, awaiting acknowledgment
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// Token used to acknowledge this delivery
    pub ack_id: String,
    pub message: Message,
}

/// Operations the relay needs from a publish/subscribe broker
///
/// Topic and subscription arguments are short names; implementations
/// qualify them with their project.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Project the client is bound to
    fn project_id(&self) -> &str;

    /// Check whether a topic exists
    async fn topic_exists(&self, topic: &str) -> BrokerResult<bool>;

    /// Create a topic; fails with [`BrokerError::AlreadyExists`] if it is already there
    async fn create_topic(&self, topic: &str) -> BrokerResult<()>;

    /// Publish one message and return the broker-assigned message id
    async fn publish(&self, topic: &str, message: OutboundMessage) -> BrokerResult<String>;

    /// Pull up to `max_messages` messages from a subscription
    async fn pull(
        &self,
        subscription: &str,
        max_messages: usize,
    ) -> BrokerResult<Vec<ReceivedMessage>>;

    /// Acknowledge delivered messages, removing them from the unacked set
    async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> BrokerResult<()>;
}
