//! Pull delivery adapter
//!
//! Runs a receive loop over the configured subscription. Each message is
//! appended to the log, counted and then acknowledged.

use pubsub_relay_broker::{BrokerClient, ReceiveOptions};
use pubsub_relay_core::MessageLog;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::base::{ChannelError, Result};

/// Summary of a pull run that ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullReport {
    pub received: u64,
}

/// Long-running consumer over a broker subscription
#[derive(Clone)]
pub struct PullAdapter {
    client: BrokerClient,
    subscription: String,
    options: ReceiveOptions,
    log: Arc<MessageLog>,
}

impl PullAdapter {
    pub fn new(client: BrokerClient, subscription: impl Into<String>, log: Arc<MessageLog>) -> Self {
        Self {
            client,
            subscription: subscription.into(),
            options: ReceiveOptions::default(),
            log,
        }
    }

    pub fn with_options(mut self, options: ReceiveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    /// Receive until cancelled, the deadline elapses, or the broker fails
    ///
    /// Cancellation and the deadline both end the run with `Ok`. Any
    /// broker failure, acknowledgment failures included, is returned as a
    /// single [`ChannelError`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<PullReport> {
        if self.subscription.trim().is_empty() {
            return Err(ChannelError::PullSetup(
                "subscription name is empty".to_string(),
            ));
        }

        let subscription = self.client.subscription(self.subscription.clone());
        info!(
            subscription = %self.subscription,
            max_messages = self.options.max_messages,
            "Pulling messages"
        );

        let received = AtomicU64::new(0);
        let counter = &received;
        let log = &self.log;

        let result = subscription
            .receive(cancel, self.options.clone(), |delivery| async move {
                info!("Got message: {:?}", delivery.message().text());
                log.append(delivery.message().data.clone());
                counter.fetch_add(1, Ordering::SeqCst);
                delivery.ack().await
            })
            .await;

        let received = received.load(Ordering::SeqCst);
        match result {
            Ok(()) => {
                info!("Received {} messages", received);
                Ok(PullReport { received })
            }
            Err(e) => {
                warn!(
                    subscription = %self.subscription,
                    received,
                    "Pull stopped: {}", e
                );
                Err(ChannelError::Receive(e))
            }
        }
    }
}
