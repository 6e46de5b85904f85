//! Message types shared by the ingestion adapters

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message received from the broker
///
/// Immutable once received; only [`Message::data`] is retained by the
/// bounded log.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Broker-assigned message identifier
    pub id: String,
    /// Opaque payload bytes
    pub data: Bytes,
    /// Message attributes
    pub attributes: HashMap<String, String>,
    /// Broker publish timestamp, when the transport reports one
    pub publish_time: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a new message
    pub fn new(id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            attributes: HashMap::new(),
            publish_time: None,
        }
    }

    /// Add an attribute to the message
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set all attributes at once
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the publish timestamp
    pub fn with_publish_time(mut self, publish_time: DateTime<Utc>) -> Self {
        self.publish_time = Some(publish_time);
        self
    }

    /// Payload rendered as text, replacing invalid UTF-8 sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Envelope posted by a broker push subscription
///
/// `data` is base64 encoded on the wire; decoding happens in the push
/// adapter so a bad encoding can be reported as a client error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub message: PushEnvelopeMessage,
    #[serde(default)]
    pub subscription: String,
}

/// The `message` object inside a [`PushRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelopeMessage {
    /// Base64 encoded payload
    pub data: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default, alias = "messageId")]
    pub message_id: String,
    #[serde(default, alias = "publishTime", skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder() {
        let msg = Message::new("42", "hello").with_attribute("origin", "test");
        assert_eq!(msg.id, "42");
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.attributes.get("origin").map(String::as_str), Some("test"));
        assert!(msg.publish_time.is_none());
    }

    #[test]
    fn test_message_text_is_lossy() {
        let msg = Message::new("1", vec![0x68, 0x69, 0xff]);
        assert_eq!(msg.text(), "hi\u{fffd}");
    }

    #[test]
    fn test_push_request_accepts_both_id_spellings() {
        let snake: PushRequest = serde_json::from_str(
            r#"{"message":{"data":"aGk=","message_id":"1"},"subscription":"projects/p/subscriptions/s"}"#,
        )
        .unwrap();
        assert_eq!(snake.message.message_id, "1");

        let camel: PushRequest = serde_json::from_str(
            r#"{"message":{"data":"aGk=","messageId":"2","attributes":{"k":"v"}}}"#,
        )
        .unwrap();
        assert_eq!(camel.message.message_id, "2");
        assert_eq!(camel.message.attributes.get("k").map(String::as_str), Some("v"));
        assert!(camel.subscription.is_empty());
    }

    #[test]
    fn test_push_request_requires_data() {
        let missing = serde_json::from_str::<PushRequest>(r#"{"message":{"message_id":"1"}}"#);
        assert!(missing.is_err());

        let null = serde_json::from_str::<PushRequest>(r#"{"message":{"data":null}}"#);
        assert!(null.is_err());
    }
}
