//! Startup orchestration
//!
//! Resolves the broker handles once, makes sure the topic exists, and then
//! decides which lifecycle governs the process:
//!
//! ```text
//! Init -> AttemptPull -> Done            (pull succeeded)
//!                     -> ServeRequests   (legacy mode, pull failed) -> Done
//! Init -> ServeRequests -> Done          (push / both)
//! ```

use anyhow::Context;
use pubsub_relay_broker::{BrokerClient, ReceiveOptions};
use pubsub_relay_channels::{ChannelError, PublishGateway, PullAdapter, PullReport};
use pubsub_relay_core::config::{Config, PullConfig, RunMode};
use pubsub_relay_core::MessageLog;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::server::RequestServer;
use crate::state::AppState;

/// Startup phases; each is entered at most once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    AttemptPull,
    ServeRequests,
    Done,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The pull run ended normally and the listener was never started
    PullCompleted(PullReport),
    /// The listener ran until shutdown
    Served,
}

/// Phase following [`Phase::Init`] for a mode
pub fn first_phase(mode: RunMode) -> Phase {
    match mode {
        RunMode::Legacy | RunMode::Pull => Phase::AttemptPull,
        RunMode::Push | RunMode::Both => Phase::ServeRequests,
    }
}

/// Phase following a failed pull run, or `None` when the failure is fatal
///
/// A pull run that ends normally always leads to [`Phase::Done`].
pub fn after_failed_pull(mode: RunMode) -> Option<Phase> {
    match mode {
        RunMode::Legacy => Some(Phase::ServeRequests),
        _ => None,
    }
}

/// Translate pull settings into receive options
pub fn receive_options(pull: &PullConfig) -> ReceiveOptions {
    ReceiveOptions {
        max_messages: pull.max_messages,
        poll_interval: Duration::from_millis(pull.poll_interval_ms),
        deadline: pull.deadline_secs.map(Duration::from_secs),
    }
}

pub struct Orchestrator<S> {
    config: Config,
    client: BrokerClient,
    server: S,
    shutdown: CancellationToken,
}

impl<S: RequestServer> Orchestrator<S> {
    pub fn new(config: Config, client: BrokerClient, server: S) -> Self {
        Self {
            config,
            client,
            server,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `shutdown` to stop pulling and serving
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the startup state machine to completion
    ///
    /// Errors are fatal: topic resolution in Init, a failed pull in `pull`
    /// mode, and a failed listener.
    pub async fn run(self) -> anyhow::Result<Outcome> {
        let mode = self.config.ingest.mode;
        info!("Starting in {} mode", mode);

        let mut phase = Phase::Init;
        let mut outcome = None;
        let mut resources = None;

        loop {
            debug!(?phase, "Entering phase");
            phase = match phase {
                Phase::Init => {
                    resources = Some(self.init().await?);
                    first_phase(mode)
                }
                Phase::AttemptPull => {
                    let (_, pull) = resources
                        .as_ref()
                        .context("pull attempted before initialization")?;
                    match pull.run(self.shutdown.child_token()).await {
                        Ok(report) => {
                            outcome = Some(Outcome::PullCompleted(report));
                            Phase::Done
                        }
                        Err(e) => match after_failed_pull(mode) {
                            Some(next) => {
                                warn!("Pull failed, serving HTTP instead: {}", e);
                                next
                            }
                            None => {
                                return Err(anyhow::Error::new(e).context("pull run failed"))
                            }
                        },
                    }
                }
                Phase::ServeRequests => {
                    let (state, pull) = resources
                        .take()
                        .context("serving attempted before initialization")?;
                    self.serve(mode, state, pull).await?;
                    outcome = Some(Outcome::Served);
                    Phase::Done
                }
                Phase::Done => {
                    return outcome.context("run ended without an outcome");
                }
            };
        }
    }

    /// Resolve the topic, create it if needed, and build the shared state
    async fn init(&self) -> anyhow::Result<(AppState, PullAdapter)> {
        let pubsub = &self.config.pubsub;
        let topic = self.client.topic(pubsub.topic.clone());
        topic
            .ensure()
            .await
            .with_context(|| format!("could not check or create topic {}", pubsub.topic))?;

        let log = Arc::new(MessageLog::new(self.config.ingest.log_capacity));
        let state = AppState::new(Arc::clone(&log), PublishGateway::new(topic));
        let pull = PullAdapter::new(self.client.clone(), pubsub.subscription.clone(), log)
            .with_options(receive_options(&self.config.ingest.pull));
        Ok((state, pull))
    }

    async fn serve(&self, mode: RunMode, state: AppState, pull: PullAdapter) -> anyhow::Result<()> {
        if mode != RunMode::Both {
            return self.server.serve(state, self.shutdown.clone()).await;
        }

        let pull_cancel = self.shutdown.child_token();
        let pull_task = {
            let cancel = pull_cancel.clone();
            tokio::spawn(async move { pull.run(cancel).await })
        };

        let served = self.server.serve(state, self.shutdown.clone()).await;

        pull_cancel.cancel();
        let pulled = pull_task
            .await
            .unwrap_or_else(|e| Err(ChannelError::TaskFailed(e.to_string())));
        match pulled {
            Ok(report) => info!("Background pull stopped after {} messages", report.received),
            Err(e) => error!("Background pull failed: {}", e),
        }
        served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pubsub_relay_broker::{Broker, BrokerError, BrokerResult, MemoryBroker, OutboundMessage, ReceivedMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records serve calls and returns after `hold`
    struct CountingServer {
        calls: Arc<AtomicUsize>,
        hold: Duration,
        seen_log_len: Arc<AtomicUsize>,
    }

    impl CountingServer {
        fn new(hold: Duration) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let seen = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    hold,
                    seen_log_len: seen.clone(),
                },
                calls,
                seen,
            )
        }
    }

    #[async_trait]
    impl RequestServer for CountingServer {
        async fn serve(&self, state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.hold) => {}
            }
            self.seen_log_len.store(state.log.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails every existence check
    struct UnreachableBroker;

    #[async_trait]
    impl Broker for UnreachableBroker {
        fn project_id(&self) -> &str {
            "demo"
        }

        async fn topic_exists(&self, _topic: &str) -> BrokerResult<bool> {
            Err(BrokerError::ApiError("HTTP 503: unavailable".to_string()))
        }

        async fn create_topic(&self, _topic: &str) -> BrokerResult<()> {
            Ok(())
        }

        async fn publish(&self, _topic: &str, _message: OutboundMessage) -> BrokerResult<String> {
            Ok("1".to_string())
        }

        async fn pull(&self, _sub: &str, _max: usize) -> BrokerResult<Vec<ReceivedMessage>> {
            Ok(Vec::new())
        }

        async fn acknowledge(&self, _sub: &str, _ack_ids: &[String]) -> BrokerResult<()> {
            Ok(())
        }
    }

    fn config(mode: RunMode, subscription: &str) -> Config {
        let mut config = Config::default();
        config.pubsub.project_id = "demo".to_string();
        config.pubsub.topic = "events".to_string();
        config.pubsub.subscription = subscription.to_string();
        config.ingest.mode = mode;
        config.ingest.pull = PullConfig {
            max_messages: 10,
            poll_interval_ms: 10,
            deadline_secs: None,
        };
        config
    }

    fn memory_with_subscription() -> Arc<MemoryBroker> {
        let broker = Arc::new(MemoryBroker::new("demo"));
        broker.register_topic("events");
        broker.create_subscription("events-sub", "events").unwrap();
        broker
    }

    #[test]
    fn test_phase_transitions() {
        assert_eq!(first_phase(RunMode::Legacy), Phase::AttemptPull);
        assert_eq!(first_phase(RunMode::Pull), Phase::AttemptPull);
        assert_eq!(first_phase(RunMode::Push), Phase::ServeRequests);
        assert_eq!(first_phase(RunMode::Both), Phase::ServeRequests);

        assert_eq!(after_failed_pull(RunMode::Legacy), Some(Phase::ServeRequests));
        assert_eq!(after_failed_pull(RunMode::Pull), None);
    }

    #[test]
    fn test_receive_options_from_config() {
        let options = receive_options(&PullConfig {
            max_messages: 5,
            poll_interval_ms: 250,
            deadline_secs: Some(3),
        });
        assert_eq!(options.max_messages, 5);
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert_eq!(options.deadline, Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_legacy_failed_pull_serves_exactly_once() {
        // the topic exists but the subscription does not, so the pull fails
        let broker = Arc::new(MemoryBroker::new("demo"));
        let (server, calls, _) = CountingServer::new(Duration::from_millis(10));
        let orchestrator = Orchestrator::new(
            config(RunMode::Legacy, "missing-sub"),
            BrokerClient::new(broker.clone()),
            server,
        );

        let outcome = orchestrator.run().await.unwrap();
        assert_eq!(outcome, Outcome::Served);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(broker.topic_exists("events").await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_without_subscription_serves() {
        let broker = memory_with_subscription();
        let (server, calls, _) = CountingServer::new(Duration::from_millis(10));
        let outcome = Orchestrator::new(
            config(RunMode::Legacy, ""),
            BrokerClient::new(broker),
            server,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Served);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_legacy_successful_pull_never_serves() {
        let broker = memory_with_subscription();
        BrokerClient::new(broker.clone())
            .topic("events")
            .publish("hello")
            .await
            .unwrap();

        let mut config = config(RunMode::Legacy, "events-sub");
        config.ingest.pull.deadline_secs = Some(1);
        let (server, calls, _) = CountingServer::new(Duration::from_millis(10));
        let outcome = Orchestrator::new(config, BrokerClient::new(broker), server)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::PullCompleted(PullReport { received: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_pull_completes_without_serving() {
        let broker = memory_with_subscription();
        let (server, calls, _) = CountingServer::new(Duration::from_millis(10));
        let orchestrator = Orchestrator::new(
            config(RunMode::Legacy, "events-sub"),
            BrokerClient::new(broker),
            server,
        );
        let shutdown = orchestrator.shutdown_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
        });

        let outcome = orchestrator.run().await.unwrap();
        assert_eq!(outcome, Outcome::PullCompleted(PullReport { received: 0 }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pull_mode_failure_is_fatal() {
        let broker = Arc::new(MemoryBroker::new("demo"));
        let (server, calls, _) = CountingServer::new(Duration::from_millis(10));
        let result = Orchestrator::new(
            config(RunMode::Pull, "missing-sub"),
            BrokerClient::new(broker),
            server,
        )
        .run()
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_mode_serves_without_pulling() {
        let broker = memory_with_subscription();
        BrokerClient::new(broker.clone())
            .topic("events")
            .publish("waiting")
            .await
            .unwrap();

        let (server, calls, seen) = CountingServer::new(Duration::from_millis(50));
        let outcome = Orchestrator::new(
            config(RunMode::Push, "events-sub"),
            BrokerClient::new(broker.clone()),
            server,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Served);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(broker.pending("events-sub"), 1);
    }

    #[tokio::test]
    async fn test_both_mode_pulls_while_serving() {
        let broker = memory_with_subscription();
        BrokerClient::new(broker.clone())
            .topic("events")
            .publish("hello")
            .await
            .unwrap();

        let (server, calls, seen) = CountingServer::new(Duration::from_millis(300));
        let outcome = Orchestrator::new(
            config(RunMode::Both, "events-sub"),
            BrokerClient::new(broker.clone()),
            server,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Served);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(broker.outstanding("events-sub"), 0);
    }

    #[tokio::test]
    async fn test_both_mode_keeps_serving_when_pull_fails() {
        let broker = Arc::new(MemoryBroker::new("demo"));
        let (server, calls, _) = CountingServer::new(Duration::from_millis(50));
        let outcome = Orchestrator::new(
            config(RunMode::Both, "missing-sub"),
            BrokerClient::new(broker),
            server,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::Served);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_init_failure_is_fatal_and_never_serves() {
        let (server, calls, _) = CountingServer::new(Duration::from_millis(10));
        let result = Orchestrator::new(
            config(RunMode::Legacy, "events-sub"),
            BrokerClient::new(Arc::new(UnreachableBroker)),
            server,
        )
        .run()
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("events"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
