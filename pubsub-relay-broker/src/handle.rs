//! Client, topic and subscription handles
//!
//! Handles are resolved once at startup and are immutable afterwards; they
//! are cheap to clone and share across tasks.

use bytes::Bytes;
use pubsub_relay_core::Message;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::base::{Broker, BrokerError, BrokerResult, OutboundMessage};

/// Entry point for resolving topic and subscription handles
#[derive(Clone)]
pub struct BrokerClient {
    broker: Arc<dyn Broker>,
}

impl BrokerClient {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    pub fn project_id(&self) -> &str {
        self.broker.project_id()
    }

    /// Handle for a topic (no broker call is made)
    pub fn topic(&self, name: impl Into<String>) -> Topic {
        Topic {
            broker: Arc::clone(&self.broker),
            name: name.into(),
        }
    }

    /// Handle for a subscription (no broker call is made)
    pub fn subscription(&self, name: impl Into<String>) -> Subscription {
        Subscription {
            broker: Arc::clone(&self.broker),
            name: name.into(),
        }
    }
}

/// A named topic
#[derive(Clone)]
pub struct Topic {
    broker: Arc<dyn Broker>,
    name: String,
}

impl Topic {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn exists(&self) -> BrokerResult<bool> {
        self.broker.topic_exists(&self.name).await
    }

    pub async fn create(&self) -> BrokerResult<()> {
        self.broker.create_topic(&self.name).await
    }

    /// Create the topic if it is missing; returns whether it was created here
    ///
    /// Losing a creation race to another instance counts as success.
    pub async fn ensure(&self) -> BrokerResult<bool> {
        if self.exists().await? {
            return Ok(false);
        }

        info!("Topic {} doesn't exist - creating it", self.name);
        match self.create().await {
            Ok(()) => Ok(true),
            Err(BrokerError::AlreadyExists(_)) => {
                debug!("Topic {} was created concurrently", self.name);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Publish a payload and wait for the broker-assigned message id
    pub async fn publish(&self, data: impl Into<Bytes>) -> BrokerResult<String> {
        self.broker
            .publish(&self.name, OutboundMessage::new(data))
            .await
    }
}

/// Tuning for [`Subscription::receive`]
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    /// Maximum messages requested per pull
    pub max_messages: usize,
    /// Wait before pulling again after an empty pull
    pub poll_interval: Duration,
    /// Stop receiving after this long; unbounded when `None`
    pub deadline: Option<Duration>,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 10,
            poll_interval: Duration::from_secs(1),
            deadline: None,
        }
    }
}

/// A named subscription
#[derive(Clone)]
pub struct Subscription {
    broker: Arc<dyn Broker>,
    name: String,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive messages until cancelled, the deadline passes, or the broker fails
    ///
    /// `callback` is handed one [`Delivery`] at a time and is responsible
    /// for acknowledging it. Only the pull request is raced against the stop
    /// signals, so a callback that is already running (and its ack) always
    /// completes. Once a stop is observed no further message is delivered,
    /// and the method returns `Ok(())`.
    pub async fn receive<F, Fut>(
        &self,
        cancel: CancellationToken,
        options: ReceiveOptions,
        mut callback: F,
    ) -> BrokerResult<()>
    where
        F: FnMut(Delivery) -> Fut,
        Fut: Future<Output = BrokerResult<()>>,
    {
        let deadline = options.deadline.map(|d| Instant::now() + d);
        let max_messages = options.max_messages.max(1);

        loop {
            if cancel.is_cancelled() || deadline_passed(deadline) {
                return Ok(());
            }

            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = sleep_until(deadline) => return Ok(()),
                batch = self.broker.pull(&self.name, max_messages) => batch?,
            };

            if batch.is_empty() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    _ = sleep_until(deadline) => return Ok(()),
                    _ = tokio::time::sleep(options.poll_interval) => {}
                }
                continue;
            }

            debug!("Pulled {} messages from {}", batch.len(), self.name);
            for received in batch {
                if cancel.is_cancelled() || deadline_passed(deadline) {
                    // left unacked; the broker redelivers after the ack deadline
                    return Ok(());
                }
                let delivery = Delivery {
                    message: received.message,
                    ack_id: received.ack_id,
                    broker: Arc::clone(&self.broker),
                    subscription: self.name.clone(),
                };
                callback(delivery).await?;
            }
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.map(|d| Instant::now() >= d).unwrap_or(false)
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// One message handed to a receive callback
pub struct Delivery {
    message: Message,
    ack_id: String,
    broker: Arc<dyn Broker>,
    subscription: String,
}

impl Delivery {
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Acknowledge the message, removing it from the subscription's unacked set
    pub async fn ack(self) -> BrokerResult<()> {
        self.broker
            .acknowledge(&self.subscription, std::slice::from_ref(&self.ack_id))
            .await
    }
}
