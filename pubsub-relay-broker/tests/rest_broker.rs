use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pubsub_relay_broker::{Broker, BrokerError, OutboundMessage, RestBroker};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Default)]
struct MockState {
    topics: HashSet<String>,
    published: Vec<Value>,
    queued: Vec<Value>,
    acked: Vec<String>,
    auth_headers: Vec<String>,
    fail_publish: bool,
}

type Shared = Arc<Mutex<MockState>>;

fn record_auth(state: &Shared, headers: &HeaderMap) {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.lock().unwrap().auth_headers.push(value.to_string());
    }
}

async fn get_topic(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_project, topic)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    record_auth(&state, &headers);
    if state.lock().unwrap().topics.contains(&topic) {
        (StatusCode::OK, Json(json!({ "name": topic })))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": { "code": 404 } })))
    }
}

async fn put_topic(
    State(state): State<Shared>,
    Path((_project, topic)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().unwrap();
    if state.topics.insert(topic.clone()) {
        (StatusCode::OK, Json(json!({ "name": topic })))
    } else {
        (StatusCode::CONFLICT, Json(json!({ "error": { "code": 409 } })))
    }
}

async fn topic_action(
    State(state): State<Shared>,
    Path((_project, topic_action)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().unwrap();
    if !topic_action.ends_with(":publish") {
        return (StatusCode::BAD_REQUEST, Json(json!({})));
    }
    if state.fail_publish {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": { "message": "unavailable" } })),
        );
    }
    state.published.push(body);
    let id = state.published.len().to_string();
    (StatusCode::OK, Json(json!({ "messageIds": [id] })))
}

async fn subscription_action(
    State(state): State<Shared>,
    Path((_project, sub_action)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().unwrap();
    if sub_action.starts_with("missing") {
        return (StatusCode::NOT_FOUND, Json(json!({})));
    }
    if sub_action.ends_with(":pull") {
        let received: Vec<Value> = std::mem::take(&mut state.queued);
        if received.is_empty() {
            return (StatusCode::OK, Json(json!({})));
        }
        return (StatusCode::OK, Json(json!({ "receivedMessages": received })));
    }
    if sub_action.ends_with(":acknowledge") {
        if let Some(ids) = body.get("ackIds").and_then(|v| v.as_array()) {
            for id in ids {
                if let Some(id) = id.as_str() {
                    state.acked.push(id.to_string());
                }
            }
        }
        return (StatusCode::OK, Json(json!({})));
    }
    (StatusCode::BAD_REQUEST, Json(json!({})))
}

struct MockPubSub {
    base: String,
    state: Shared,
    task: JoinHandle<()>,
}

impl MockPubSub {
    async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new()
            .route(
                "/v1/projects/:project/topics/:topic",
                get(get_topic).put(put_topic).post(topic_action),
            )
            .route(
                "/v1/projects/:project/subscriptions/:subscription",
                post(subscription_action),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock pubsub listener");
        let addr = listener.local_addr().expect("get mock pubsub address");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base: format!("http://{}", addr),
            state,
            task,
        }
    }

    fn broker(&self, token: Option<&str>) -> RestBroker {
        RestBroker::new(
            self.base.clone(),
            "demo",
            token.map(ToString::to_string),
            Duration::from_secs(5),
        )
        .expect("build rest broker")
    }
}

impl Drop for MockPubSub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[tokio::test]
async fn test_topic_exists_and_create() {
    let mock = MockPubSub::spawn().await;
    let broker = mock.broker(Some("secret-token"));

    assert!(!broker.topic_exists("events").await.unwrap());
    broker.create_topic("events").await.unwrap();
    assert!(broker.topic_exists("events").await.unwrap());

    let err = broker.create_topic("events").await.unwrap_err();
    assert!(matches!(err, BrokerError::AlreadyExists(_)));

    let auth = mock.state.lock().unwrap().auth_headers.clone();
    assert!(auth.iter().all(|h| h == "Bearer secret-token"));
    assert!(!auth.is_empty());
}

#[tokio::test]
async fn test_publish_sends_base64_payload() {
    let mock = MockPubSub::spawn().await;
    let broker = mock.broker(None);

    let id = broker
        .publish(
            "events",
            OutboundMessage::new("hello").with_attribute("source", "test"),
        )
        .await
        .unwrap();
    assert_eq!(id, "1");

    let published = mock.state.lock().unwrap().published.clone();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["messages"][0]["data"], "aGVsbG8=");
    assert_eq!(published[0]["messages"][0]["attributes"]["source"], "test");
}

#[tokio::test]
async fn test_publish_failure_is_api_error() {
    let mock = MockPubSub::spawn().await;
    mock.state.lock().unwrap().fail_publish = true;
    let broker = mock.broker(None);

    let err = broker
        .publish("events", OutboundMessage::new("x"))
        .await
        .unwrap_err();
    match err {
        BrokerError::ApiError(detail) => assert!(detail.contains("503")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_pull_decodes_and_acknowledge_posts_ids() {
    let mock = MockPubSub::spawn().await;
    mock.state.lock().unwrap().queued = vec![json!({
        "ackId": "ack-1",
        "message": {
            "data": "d29ybGQ=",
            "attributes": { "k": "v" },
            "messageId": "101",
            "publishTime": "2024-05-01T12:00:00Z"
        }
    })];
    let broker = mock.broker(None);

    let batch = broker.pull("events-sub", 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].ack_id, "ack-1");
    assert_eq!(batch[0].message.id, "101");
    assert_eq!(batch[0].message.text(), "world");
    assert!(batch[0].message.publish_time.is_some());

    // empty pull response body
    assert!(broker.pull("events-sub", 10).await.unwrap().is_empty());

    broker
        .acknowledge("events-sub", &["ack-1".to_string()])
        .await
        .unwrap();
    assert_eq!(mock.state.lock().unwrap().acked, vec!["ack-1".to_string()]);
}

#[tokio::test]
async fn test_pull_missing_subscription_is_not_found() {
    let mock = MockPubSub::spawn().await;
    let broker = mock.broker(None);
    let err = broker.pull("missing-sub", 10).await.unwrap_err();
    assert!(matches!(err, BrokerError::NotFound(_)));
}

#[tokio::test]
async fn test_unreachable_broker_is_http_error() {
    let broker = RestBroker::new(
        "http://127.0.0.1:9",
        "demo",
        None,
        Duration::from_millis(500),
    )
    .unwrap();
    let err = broker.topic_exists("events").await.unwrap_err();
    assert!(matches!(err, BrokerError::HttpError(_)));
}
