//! REST client for the Pub/Sub v1 HTTP surface
//!
//! Works against the managed service and against the local emulator
//! (`PUBSUB_EMULATOR_HOST`), which speaks the same JSON over plain HTTP.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use pubsub_relay_core::config::PubSubConfig;
use pubsub_relay_core::Message;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::base::{Broker, BrokerError, BrokerResult, OutboundMessage, ReceivedMessage};

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    messages: Vec<WireOutbound<'a>>,
}

#[derive(Debug, Serialize)]
struct WireOutbound<'a> {
    data: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceived>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceived {
    ack_id: String,
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    data: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    message_id: String,
    #[serde(default)]
    publish_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest<'a> {
    ack_ids: &'a [String],
}

/// Broker client speaking the Pub/Sub REST API
pub struct RestBroker {
    client: Client,
    api_base: String,
    project_id: String,
    access_token: Option<String>,
}

impl RestBroker {
    /// Create a new REST client
    pub fn new(
        api_base: impl Into<String>,
        project_id: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> BrokerResult<Self> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(BrokerError::ConfigError(
                "project id must not be empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            project_id,
            access_token: access_token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Create a client from the relay configuration
    pub fn from_config(config: &PubSubConfig) -> BrokerResult<Self> {
        Self::new(
            config.base_url(),
            config.project_id.clone(),
            config.access_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn topic_path(&self, topic: &str) -> String {
        qualify(&self.project_id, "topics", topic)
    }

    fn subscription_path(&self, subscription: &str) -> String {
        qualify(&self.project_id, "subscriptions", subscription)
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/v1/{}", self.api_base, resource)
    }

    fn apply_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map non-success responses onto broker errors
    async fn check(response: Response, resource: &str) -> BrokerResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        match status {
            StatusCode::NOT_FOUND => Err(BrokerError::NotFound(resource.to_string())),
            StatusCode::CONFLICT => Err(BrokerError::AlreadyExists(resource.to_string())),
            _ => Err(BrokerError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            ))),
        }
    }
}

/// Qualify a short resource name; names already starting with `projects/` pass through
fn qualify(project_id: &str, collection: &str, name: &str) -> String {
    if name.starts_with("projects/") {
        name.to_string()
    } else {
        format!("projects/{}/{}/{}", project_id, collection, name)
    }
}

fn decode_message(wire: WireMessage) -> BrokerResult<Message> {
    let data = STANDARD.decode(wire.data.as_bytes()).map_err(|e| {
        BrokerError::InvalidResponse(format!(
            "message {} has invalid base64 data: {}",
            wire.message_id, e
        ))
    })?;

    let mut message = Message::new(wire.message_id, data).with_attributes(wire.attributes);
    if let Some(publish_time) = wire.publish_time {
        message = message.with_publish_time(publish_time);
    }
    Ok(message)
}

#[async_trait]
impl Broker for RestBroker {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn topic_exists(&self, topic: &str) -> BrokerResult<bool> {
        let path = self.topic_path(topic);
        debug!("Checking topic {}", path);

        let response = self
            .apply_auth(self.client.get(self.url(&path)))
            .send()
            .await?;
        match Self::check(response, &path).await {
            Ok(_) => Ok(true),
            Err(BrokerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_topic(&self, topic: &str) -> BrokerResult<()> {
        let path = self.topic_path(topic);
        debug!("Creating topic {}", path);

        let response = self
            .apply_auth(self.client.put(self.url(&path)).json(&serde_json::json!({})))
            .send()
            .await?;
        Self::check(response, &path).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, message: OutboundMessage) -> BrokerResult<String> {
        let path = self.topic_path(topic);
        let request = PublishRequest {
            messages: vec![WireOutbound {
                data: STANDARD.encode(&message.data),
                attributes: &message.attributes,
            }],
        };
        debug!("Publishing {} bytes to {}", message.data.len(), path);

        let response = self
            .apply_auth(
                self.client
                    .post(self.url(&format!("{}:publish", path)))
                    .json(&request),
            )
            .send()
            .await?;
        let response = Self::check(response, &path).await?;
        let body: PublishResponse = response.json().await?;

        body.message_ids.into_iter().next().ok_or_else(|| {
            BrokerError::InvalidResponse("publish response carried no message id".to_string())
        })
    }

    async fn pull(
        &self,
        subscription: &str,
        max_messages: usize,
    ) -> BrokerResult<Vec<ReceivedMessage>> {
        let path = self.subscription_path(subscription);
        let response = self
            .apply_auth(
                self.client
                    .post(self.url(&format!("{}:pull", path)))
                    .json(&PullRequest { max_messages }),
            )
            .send()
            .await?;
        let response = Self::check(response, &path).await?;
        let body: PullResponse = response.json().await?;

        body.received_messages
            .into_iter()
            .map(|received| {
                Ok(ReceivedMessage {
                    ack_id: received.ack_id,
                    message: decode_message(received.message)?,
                })
            })
            .collect()
    }

    async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> BrokerResult<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }

        let path = self.subscription_path(subscription);
        let response = self
            .apply_auth(
                self.client
                    .post(self.url(&format!("{}:acknowledge", path)))
                    .json(&AcknowledgeRequest { ack_ids }),
            )
            .send()
            .await?;
        Self::check(response, &path).await?;
        Ok(())
    }
}
