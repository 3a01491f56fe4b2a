//! Configuration loading for the relay
//!
//! A JSON file (every field optional) supplies the base settings; a small
//! set of environment variables overrides them at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::application::{PollingSettings, RateLimitConfig};
use crate::infrastructure::fetch::RetryPolicy;

/// Placeholder substituted with the subscription key in the remote endpoint
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote log source
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    /// Admission limits per origin
    #[serde(default)]
    pub rate_limit: RateLimitSection,
}

impl RelayConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup` (variable name -> value)
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            self.server.port = port;
        }
        if let Some(endpoint) = lookup("REMOTE_ENDPOINT") {
            self.remote.endpoint = endpoint;
        }
        if let Some(token) = lookup("REMOTE_TOKEN") {
            self.remote.bearer_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(field) = lookup("REMOTE_FIELD") {
            self.remote.messages_field = field;
        }
        if let Some(interval) = parse_var(&lookup, "POLL_INTERVAL_MS")? {
            self.polling.interval_ms = interval;
        }
        if let Some(window) = parse_var(&lookup, "RATE_LIMIT_WINDOW_MS")? {
            self.rate_limit.window_ms = window;
        }
        if let Some(max) = parse_var(&lookup, "RATE_LIMIT_MAX")? {
            self.rate_limit.max_requests = max;
        }
        Ok(())
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero_checks = [
            ("remote.timeout_ms", self.remote.timeout_ms),
            ("remote.max_attempts", u64::from(self.remote.max_attempts)),
            ("remote.max_entry_chars", self.remote.max_entry_chars as u64),
            ("polling.interval_ms", self.polling.interval_ms),
            ("polling.failure_threshold", u64::from(self.polling.failure_threshold)),
            ("polling.max_batch", self.polling.max_batch as u64),
            ("rate_limit.window_ms", self.rate_limit.window_ms),
            ("rate_limit.max_requests", u64::from(self.rate_limit.max_requests)),
        ];
        if let Some((field, _)) = zero_checks.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than zero", field)));
        }

        if !self.remote.endpoint.contains(KEY_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "remote.endpoint must contain the {} placeholder",
                KEY_PLACEHOLDER
            )));
        }
        if self.remote.messages_field.is_empty() {
            return Err(ConfigError::Invalid(
                "remote.messages_field must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn polling_settings(&self) -> PollingSettings {
        PollingSettings {
            interval: Duration::from_millis(self.polling.interval_ms),
            failure_threshold: self.polling.failure_threshold,
            max_batch: self.polling.max_batch,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.remote.max_attempts,
            base_delay: Duration::from_millis(self.remote.base_delay_ms),
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window_ms: self.rate_limit.window_ms,
            max_requests: self.rate_limit.max_requests,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(format!("{} is not a valid number: {:?}", name, raw))),
        None => Ok(None),
    }
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// URL template; `{key}` is replaced with the subscription key
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Sent as `Authorization: Bearer <token>` when set
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Response field holding the array of JSON-encoded entries
    #[serde(default = "default_messages_field")]
    pub messages_field: String,
    /// Per-attempt request timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_entry_chars")]
    pub max_entry_chars: usize,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/logs/{key}".to_string()
}

fn default_messages_field() -> String {
    "messages".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_entry_chars() -> usize {
    10_000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            bearer_token: None,
            messages_field: default_messages_field(),
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_entry_chars: default_max_entry_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Consecutive failed ticks before a key's poller stops
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Most entries relayed per key per tick
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_max_batch() -> usize {
    100
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            failure_threshold: default_failure_threshold(),
            max_batch: default_max_batch(),
        }
    }
}

/// Rate limit configuration (JSON form)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_window_ms() -> u64 {
    900_000
}

fn default_max_requests() -> u32 {
    100
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = RelayConfig::from_json("{}").unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.polling.interval_ms, 5000);
        assert_eq!(config.rate_limit.window_ms, 900_000);
        assert_eq!(config.remote.messages_field, "messages");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_sections() {
        let json = r#"{
            "remote": {
                "endpoint": "https://logs.internal/api/{key}/entries",
                "bearer_token": "secret"
            },
            "polling": { "interval_ms": 250 }
        }"#;

        let config = RelayConfig::from_json(json).unwrap();
        assert_eq!(config.remote.bearer_token.as_deref(), Some("secret"));
        assert_eq!(config.remote.max_attempts, 3);
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.polling.failure_threshold, 5);
        assert_eq!(
            config.polling_settings().interval,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            RelayConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        match RelayConfig::from_file("/nonexistent/relay.json") {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, "/nonexistent/relay.json"),
            other => panic!("expected io error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RelayConfig::default();
        config
            .apply_overrides(env(&[
                ("PORT", "4100"),
                ("REMOTE_ENDPOINT", "http://remote:9000/{key}"),
                ("REMOTE_TOKEN", "abc"),
                ("POLL_INTERVAL_MS", "1000"),
                ("RATE_LIMIT_MAX", "10"),
            ]))
            .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:4100");
        assert_eq!(config.remote.endpoint, "http://remote:9000/{key}");
        assert_eq!(config.remote.bearer_token.as_deref(), Some("abc"));
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.rate_limit_config().max_requests, 10);
        assert_eq!(config.rate_limit_config().window_ms, 900_000);
    }

    #[test]
    fn test_env_override_rejects_garbage_numbers() {
        let mut config = RelayConfig::default();
        let err = config
            .apply_overrides(env(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_zero_and_missing_placeholder() {
        let mut config = RelayConfig::default();
        config.polling.interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = RelayConfig::default();
        config.remote.endpoint = "http://remote/logs".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_retry_policy_from_remote_section() {
        let policy = RelayConfig::default().retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
    }
}
