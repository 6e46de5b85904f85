//! Broker client integrations for pubsub-relay
//!
//! This crate provides the [`Broker`] abstraction, a REST implementation
//! for the managed service and its emulator, an in-process implementation,
//! and the topic/subscription handles built on top of them.

pub mod base;
pub mod handle;
pub mod memory;
pub mod rest;

pub use base::{Broker, BrokerError, BrokerResult, OutboundMessage, ReceivedMessage};
pub use handle::{BrokerClient, Delivery, ReceiveOptions, Subscription, Topic};
pub use memory::MemoryBroker;
pub use rest::RestBroker;

use pubsub_relay_core::config::{BrokerBackend, PubSubConfig};
use std::sync::Arc;
use tracing::info;

/// Construct the broker client selected by the configuration
pub fn connect(config: &PubSubConfig) -> BrokerResult<BrokerClient> {
    let broker: Arc<dyn Broker> = match config.backend {
        BrokerBackend::Rest => {
            let broker = RestBroker::from_config(config)?;
            info!(
                "Using REST broker at {} (project {})",
                config.base_url(),
                config.project_id
            );
            Arc::new(broker)
        }
        BrokerBackend::Memory => {
            let broker = MemoryBroker::new(config.project_id.clone());
            // pull mode needs a subscription to pull from, and it needs its topic
            if !config.topic.is_empty() && !config.subscription.is_empty() {
                broker.register_topic(&config.topic);
                broker.create_subscription(&config.subscription, &config.topic)?;
            }
            info!("Using in-memory broker (project {})", config.project_id);
            Arc::new(broker)
        }
    };
    Ok(BrokerClient::new(broker))
}
