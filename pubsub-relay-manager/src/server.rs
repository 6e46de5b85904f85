use anyhow::Context;
use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    health_handler, index_handler, messages_handler, publish_handler, push_handler,
};
use crate::state::AppState;

/// Build the relay's routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/pubsub/publish", post(publish_handler))
        .route("/pubsub/push", post(push_handler))
        .route("/api/messages", get(messages_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` is cancelled
pub async fn run_server(
    state: AppState,
    addr: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            tracing::info!("Server shutting down signal received");
        })
        .await?;

    Ok(())
}

/// Something that serves HTTP requests until shutdown
#[async_trait]
pub trait RequestServer: Send + Sync {
    async fn serve(&self, state: AppState, shutdown: CancellationToken) -> anyhow::Result<()>;
}

/// The axum listener bound to a configured address
pub struct HttpServer {
    addr: String,
}

impl HttpServer {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl RequestServer for HttpServer {
    async fn serve(&self, state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
        run_server(state, &self.addr, shutdown).await
    }
}
