//! Publish gateway

use bytes::Bytes;
use pubsub_relay_broker::Topic;
use tracing::{debug, warn};

use crate::base::{ChannelError, Result};

/// Forwards outbound payloads to the topic resolved at startup
#[derive(Clone)]
pub struct PublishGateway {
    topic: Topic,
}

impl PublishGateway {
    pub fn new(topic: Topic) -> Self {
        Self { topic }
    }

    pub fn topic_name(&self) -> &str {
        self.topic.name()
    }

    /// Publish one message and wait for the broker-assigned id
    ///
    /// Does not retry.
    pub async fn publish(&self, payload: impl Into<Bytes>) -> Result<String> {
        let payload = payload.into();
        let size = payload.len();
        match self.topic.publish(payload).await {
            Ok(id) => {
                debug!(topic = %self.topic.name(), message_id = %id, bytes = size, "Published message");
                Ok(id)
            }
            Err(e) => {
                warn!(topic = %self.topic.name(), "Publish failed: {}", e);
                Err(ChannelError::Publish(e))
            }
        }
    }
}
