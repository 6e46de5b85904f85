//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".pubsub-relay"))
            .unwrap_or_else(|| PathBuf::from(".pubsub-relay"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file and environment
    pub fn load(&self) -> crate::Result<Config> {
        let config_path = self.config_dir.join("config.json");
        let mut merged = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file_value: Value = serde_json::from_str(&content)?;
            merge_json(&mut merged, file_value);
            tracing::debug!("Merged configuration file {}", config_path.display());
        }

        apply_alias_overrides(&mut merged)?;
        apply_path_overrides(&mut merged);

        let config: Config = serde_json::from_value(merged)
            .map_err(|e| crate::Error::Config(format!("invalid configuration: {}", e)))?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let config_path = self.config_dir.join("config.json");
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively overlay `overlay` onto `base`; objects merge, everything else replaces
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Interpret an override value: JSON literals first, then loose booleans, else a string
fn env_value(raw: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Write `value` at `path`, replacing non-object intermediates with objects
fn insert_at(node: &mut Value, path: &[&str], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map
            .entry((*head).to_string())
            .or_insert(Value::Null);
        insert_at(child, rest, value);
    }
}

/// Legacy environment variables and where they land in the config tree
const ENV_ALIASES: [(&str, &str); 6] = [
    ("ENV", "environment"),
    ("GOOGLE_CLOUD_PROJECT_ID", "pubsub.project_id"),
    ("PUBSUB_TOPIC", "pubsub.topic"),
    ("PUBSUB_SUBSCRIPTION", "pubsub.subscription"),
    ("PUBSUB_EMULATOR_HOST", "pubsub.emulator_host"),
    ("SERVER_PORT", "server.port"),
];

fn apply_alias_overrides(config: &mut Value) -> crate::Result<()> {
    for (env_key, target_path) in ENV_ALIASES {
        let value = match std::env::var(env_key) {
            Ok(value) if !value.trim().is_empty() => value,
            _ => continue,
        };
        let value = if env_key == "SERVER_PORT" {
            let port = value.trim().parse::<u16>().map_err(|e| {
                crate::Error::Config(format!(
                    "SERVER_PORT must be a port number, got '{}': {}",
                    value, e
                ))
            })?;
            Value::Number(port.into())
        } else {
            Value::String(value)
        };
        let path: Vec<&str> = target_path.split('.').collect();
        insert_at(config, &path, value);
    }
    Ok(())
}

/// Apply `PUBSUB_RELAY__SECTION__KEY=value` overrides
fn apply_path_overrides(config: &mut Value) {
    const PREFIX: &str = "PUBSUB_RELAY__";
    for (key, raw) in std::env::vars() {
        let Some(suffix) = key.strip_prefix(PREFIX) else {
            continue;
        };
        let segments: Vec<String> = suffix
            .split("__")
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if segments.is_empty() {
            continue;
        }
        let path: Vec<&str> = segments.iter().map(String::as_str).collect();
        insert_at(config, &path, env_value(&raw));
    }
}
