use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use tracing::{info, warn};

use crate::page::render_index;
use crate::state::{AppState, MessagesResponse, PublishForm};

/// `POST /pubsub/publish`
pub async fn publish_handler(
    State(state): State<AppState>,
    Form(form): Form<PublishForm>,
) -> Response {
    match state.gateway.publish(form.payload).await {
        Ok(id) => {
            info!("Published message {}", id);
            (StatusCode::OK, "Message published.").into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not publish message: {}", e),
        )
            .into_response(),
    }
}

/// `POST /pubsub/push`
pub async fn push_handler(State(state): State<AppState>, body: Bytes) -> Response {
    match state.push.handle(&body) {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!("Rejected push delivery: {}", e);
            (
                StatusCode::BAD_REQUEST,
                format!("Could not decode body: {}", e),
            )
                .into_response()
        }
    }
}

/// `GET /`
pub async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.log.snapshot(), state.log.capacity()))
}

/// `GET /api/messages`
pub async fn messages_handler(State(state): State<AppState>) -> Json<MessagesResponse> {
    let messages = state
        .log
        .snapshot()
        .iter()
        .map(|payload| String::from_utf8_lossy(payload).into_owned())
        .collect();
    Json(MessagesResponse {
        capacity: state.log.capacity(),
        messages,
    })
}

/// `GET /health`
pub async fn health_handler() -> &'static str {
    "ok"
}
