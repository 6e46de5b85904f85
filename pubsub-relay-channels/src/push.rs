//! Push delivery adapter
//!
//! Invoked once per broker push request. Decodes the envelope and appends
//! the payload to the shared log.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use pubsub_relay_core::{MessageLog, PushRequest};
use std::sync::Arc;
use tracing::debug;

use crate::base::PushError;

/// What a successful push delivery stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceipt {
    pub message_id: String,
    pub subscription: String,
    pub bytes: usize,
}

/// Adapter for broker push subscriptions
#[derive(Clone)]
pub struct PushAdapter {
    log: Arc<MessageLog>,
}

impl PushAdapter {
    pub fn new(log: Arc<MessageLog>) -> Self {
        Self { log }
    }

    /// Decode one push envelope and append its payload
    ///
    /// Appends exactly once on success and never on error.
    pub fn handle(&self, body: &[u8]) -> Result<PushReceipt, PushError> {
        let request: PushRequest = serde_json::from_slice(body)?;
        let payload = STANDARD.decode(request.message.data.as_bytes())?;

        let receipt = PushReceipt {
            message_id: request.message.message_id,
            subscription: request.subscription,
            bytes: payload.len(),
        };
        self.log.append(Bytes::from(payload));

        debug!(
            message_id = %receipt.message_id,
            subscription = %receipt.subscription,
            bytes = receipt.bytes,
            "Stored pushed message"
        );
        Ok(receipt)
    }
}
