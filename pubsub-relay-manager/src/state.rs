use pubsub_relay_channels::{PublishGateway, PushAdapter};
use pubsub_relay_core::MessageLog;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub log: Arc<MessageLog>,
    pub push: PushAdapter,
    pub gateway: PublishGateway,
}

impl AppState {
    pub fn new(log: Arc<MessageLog>, gateway: PublishGateway) -> Self {
        Self {
            push: PushAdapter::new(Arc::clone(&log)),
            log,
            gateway,
        }
    }
}

/// Form posted to the publish route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishForm {
    #[serde(default)]
    pub payload: String,
}

/// Body of `GET /api/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub capacity: usize,
    pub messages: Vec<String>,
}
