//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::bus::DEFAULT_LOG_CAPACITY;

/// Root configuration for pubsub-relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deployment environment name (e.g. "local", "staging")
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Broker configuration
    #[serde(default)]
    pub pubsub: PubSubConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Ingestion configuration
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_environment() -> String {
    "local".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            pubsub: PubSubConfig::default(),
            server: ServerConfig::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Which broker client implementation to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// HTTP/JSON client of the broker REST surface (or its emulator)
    #[default]
    Rest,
    /// In-process broker, for local development
    Memory,
}

/// Broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubConfig {
    /// Broker project identifier
    #[serde(default)]
    pub project_id: String,
    /// Topic that published messages go to
    #[serde(default)]
    pub topic: String,
    /// Subscription consumed in pull mode
    #[serde(default)]
    pub subscription: String,
    /// Client implementation
    #[serde(default)]
    pub backend: BrokerBackend,
    /// REST endpoint, without the `/v1` suffix
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Emulator `host:port`; takes precedence over `endpoint` when set
    #[serde(default)]
    pub emulator_host: Option<String>,
    /// Pre-issued bearer token passed through verbatim
    #[serde(default)]
    pub access_token: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            topic: String::new(),
            subscription: String::new(),
            backend: BrokerBackend::default(),
            endpoint: default_endpoint(),
            emulator_host: None,
            access_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PubSubConfig {
    /// Effective REST base URL, honouring the emulator host
    pub fn base_url(&self) -> String {
        match self.emulator_host.as_deref().map(str::trim) {
            Some(host) if !host.is_empty() => {
                if host.starts_with("http://") || host.starts_with("https://") {
                    host.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", host.trim_end_matches('/'))
                }
            }
            _ => self.endpoint.trim_end_matches('/').to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Port used when none is configured
pub const DEFAULT_PORT: u16 = 8080;

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How the process lifecycle is governed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Try pulling; serve HTTP only if the pull run fails
    #[default]
    Legacy,
    /// Pull only; the process ends when the pull run ends
    Pull,
    /// Serve HTTP only (push delivery, publish, read)
    Push,
    /// Serve HTTP and pull concurrently
    Both,
}

impl RunMode {
    /// Whether startup must have a subscription configured
    ///
    /// Legacy mode tolerates a missing one: the failed pull hands over to
    /// the HTTP listener.
    pub fn requires_subscription(self) -> bool {
        matches!(self, RunMode::Pull | RunMode::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Legacy => "legacy",
            RunMode::Pull => "pull",
            RunMode::Push => "push",
            RunMode::Both => "both",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(RunMode::Legacy),
            "pull" => Ok(RunMode::Pull),
            "push" => Ok(RunMode::Push),
            "both" => Ok(RunMode::Both),
            other => Err(format!(
                "unknown run mode '{}' (expected legacy, pull, push or both)",
                other
            )),
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Run mode selection
    #[serde(default)]
    pub mode: RunMode,
    /// Number of payloads retained by the message log
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Pull adapter settings
    #[serde(default)]
    pub pull: PullConfig,
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            log_capacity: default_log_capacity(),
            pull: PullConfig::default(),
        }
    }
}

/// Pull adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullConfig {
    /// Maximum messages requested per pull
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Delay before pulling again after an empty pull, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Stop the receive loop after this many seconds (unbounded when unset)
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

fn default_max_messages() -> usize {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            poll_interval_ms: default_poll_interval_ms(),
            deadline_secs: None,
        }
    }
}
