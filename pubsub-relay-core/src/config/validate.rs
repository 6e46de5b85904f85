//! Configuration validation rules.

use super::schema::{BrokerBackend, Config};

/// Validate configuration and return aggregated validation errors.
///
/// Only checks that hold for every command; see [`validate_run_config`]
/// for the checks that depend on the run mode.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    finish(base_errors(config))
}

/// Validate a configuration about to be run, after command-line overrides
pub fn validate_run_config(config: &Config) -> crate::Result<()> {
    let mut errors = base_errors(config);
    if config.ingest.mode.requires_subscription() && config.pubsub.subscription.trim().is_empty() {
        errors.push(format!(
            "pubsub.subscription is required when ingest.mode is {}",
            config.ingest.mode
        ));
    }
    finish(errors)
}

fn base_errors(config: &Config) -> Vec<String> {
    let mut errors = Vec::new();

    if config.pubsub.project_id.trim().is_empty() {
        errors.push("pubsub.project_id must not be empty".to_string());
    }
    if config.pubsub.topic.trim().is_empty() {
        errors.push("pubsub.topic must not be empty".to_string());
    }
    if config.pubsub.backend == BrokerBackend::Rest {
        let endpoint = config.pubsub.base_url();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(format!(
                "pubsub.endpoint must be an http(s) URL, got '{}'",
                endpoint
            ));
        }
    }
    if config.pubsub.request_timeout_secs == 0 {
        errors.push("pubsub.request_timeout_secs must be > 0".to_string());
    }

    if config.server.port == 0 {
        errors.push("server.port must be > 0".to_string());
    }
    if config.server.host.trim().is_empty() {
        errors.push("server.host must not be empty".to_string());
    }

    if config.ingest.log_capacity == 0 {
        errors.push("ingest.log_capacity must be > 0".to_string());
    }
    if !(1..=1000).contains(&config.ingest.pull.max_messages) {
        errors.push("ingest.pull.max_messages must be in [1, 1000]".to_string());
    }
    if config.ingest.pull.poll_interval_ms == 0 {
        errors.push("ingest.pull.poll_interval_ms must be > 0".to_string());
    }
    errors
}

fn finish(errors: Vec<String>) -> crate::Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
