//! Errors shared by the adapters

use pubsub_relay_broker::BrokerError;

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Publish failed: {0}")]
    Publish(#[source] BrokerError),

    #[error("Could not create pull client: {0}")]
    PullSetup(String),

    #[error("Receive failed: {0}")]
    Receive(#[source] BrokerError),

    #[error("Pull task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// A push envelope that could not be decoded
///
/// Always the caller's fault; the log is never touched when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("invalid push envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("message data is not valid base64: {0}")]
    Data(#[from] base64::DecodeError),
}
