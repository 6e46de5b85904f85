//! In-process broker
//!
//! Keeps topics, subscriptions and their unacked sets in memory. Used for
//! local development (`pubsub.backend = "memory"`) and in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use pubsub_relay_core::Message;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

use crate::base::{Broker, BrokerError, BrokerResult, OutboundMessage, ReceivedMessage};

#[derive(Debug, Default)]
struct SubscriptionState {
    topic: String,
    pending: VecDeque<Message>,
    outstanding: HashMap<String, Message>,
}

#[derive(Debug, Default)]
struct State {
    topics: HashSet<String>,
    subscriptions: HashMap<String, SubscriptionState>,
    published: HashMap<String, Vec<Message>>,
    next_message_id: u64,
}

/// Broker that lives entirely inside the process
#[derive(Debug)]
pub struct MemoryBroker {
    project_id: String,
    state: Mutex<State>,
}

impl MemoryBroker {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            state: Mutex::new(State::default()),
        }
    }

    /// Add a topic without going through the async trait; returns false if it already existed
    pub fn register_topic(&self, topic: &str) -> bool {
        self.state.lock().topics.insert(topic.to_string())
    }

    /// Attach a subscription to an existing topic
    pub fn create_subscription(&self, subscription: &str, topic: &str) -> BrokerResult<()> {
        let mut state = self.state.lock();
        if !state.topics.contains(topic) {
            return Err(BrokerError::NotFound(format!("topic {}", topic)));
        }
        if state.subscriptions.contains_key(subscription) {
            return Err(BrokerError::AlreadyExists(format!(
                "subscription {}",
                subscription
            )));
        }
        state.subscriptions.insert(
            subscription.to_string(),
            SubscriptionState {
                topic: topic.to_string(),
                ..SubscriptionState::default()
            },
        );
        Ok(())
    }

    /// Every message ever published to `topic`, oldest first
    pub fn published(&self, topic: &str) -> Vec<Message> {
        self.state
            .lock()
            .published
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Messages delivered by a pull but not yet acknowledged
    pub fn outstanding(&self, subscription: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(subscription)
            .map(|s| s.outstanding.len())
            .unwrap_or(0)
    }

    /// Messages waiting to be pulled
    pub fn pending(&self, subscription: &str) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(subscription)
            .map(|s| s.pending.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn topic_exists(&self, topic: &str) -> BrokerResult<bool> {
        Ok(self.state.lock().topics.contains(topic))
    }

    async fn create_topic(&self, topic: &str) -> BrokerResult<()> {
        if !self.register_topic(topic) {
            return Err(BrokerError::AlreadyExists(format!("topic {}", topic)));
        }
        debug!("Created in-memory topic {}", topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, message: OutboundMessage) -> BrokerResult<String> {
        let mut state = self.state.lock();
        if !state.topics.contains(topic) {
            return Err(BrokerError::NotFound(format!("topic {}", topic)));
        }

        state.next_message_id += 1;
        let id = state.next_message_id.to_string();
        let stored = Message::new(id.clone(), message.data)
            .with_attributes(message.attributes)
            .with_publish_time(chrono::Utc::now());

        for sub in state.subscriptions.values_mut() {
            if sub.topic == topic {
                sub.pending.push_back(stored.clone());
            }
        }
        state
            .published
            .entry(topic.to_string())
            .or_default()
            .push(stored);

        Ok(id)
    }

    async fn pull(
        &self,
        subscription: &str,
        max_messages: usize,
    ) -> BrokerResult<Vec<ReceivedMessage>> {
        let mut state = self.state.lock();
        let sub = state
            .subscriptions
            .get_mut(subscription)
            .ok_or_else(|| BrokerError::NotFound(format!("subscription {}", subscription)))?;

        let mut batch = Vec::new();
        while batch.len() < max_messages {
            let Some(message) = sub.pending.pop_front() else {
                break;
            };
            let ack_id = Uuid::new_v4().to_string();
            sub.outstanding.insert(ack_id.clone(), message.clone());
            batch.push(ReceivedMessage { ack_id, message });
        }
        Ok(batch)
    }

    async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> BrokerResult<()> {
        let mut state = self.state.lock();
        let sub = state
            .subscriptions
            .get_mut(subscription)
            .ok_or_else(|| BrokerError::NotFound(format!("subscription {}", subscription)))?;

        // unknown or already-acked ids are ignored, as the managed service does
        for ack_id in ack_ids {
            sub.outstanding.remove(ack_id);
        }
        Ok(())
    }
}
