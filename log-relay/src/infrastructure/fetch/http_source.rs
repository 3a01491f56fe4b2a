use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::application::ports::{FetchError, FetchResult, LogSource};
use crate::domain::{RemoteLog, RemoteLogEntry, SubscriptionKey};
use crate::infrastructure::config::{KEY_PLACEHOLDER, RemoteConfig};

/// Why a 2xx body could not be read as a log. Never surfaced as a fetch
/// failure: the tick simply sees zero entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedShape {
    #[error("Response body is not JSON")]
    NotJson,
    #[error("Response has no '{0}' field")]
    MissingField(String),
    #[error("Response field '{0}' is not an array")]
    NotAnArray(String),
}

/// Read the remote log out of a response body.
///
/// Array elements that are not strings, exceed `max_entry_chars`, or do not
/// hold well-formed JSON are dropped and counted in `RemoteLog::dropped`.
pub fn parse_remote_log(
    body: &str,
    field: &str,
    max_entry_chars: usize,
) -> Result<RemoteLog, MalformedShape> {
    let value: Value = serde_json::from_str(body).map_err(|_| MalformedShape::NotJson)?;

    let items = match value.get(field) {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(MalformedShape::NotAnArray(field.to_string())),
        None => return Err(MalformedShape::MissingField(field.to_string())),
    };

    let mut log = RemoteLog::empty();
    for item in items {
        match item
            .as_str()
            .and_then(|raw| RemoteLogEntry::parse(raw, max_entry_chars))
        {
            Some(entry) => log.entries.push(entry),
            None => log.dropped += 1,
        }
    }
    Ok(log)
}

/// Single-attempt HTTP GET against the remote log endpoint
#[derive(Clone)]
pub struct HttpLogSource {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
    messages_field: String,
    max_entry_chars: usize,
}

impl HttpLogSource {
    pub fn new(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(HttpLogSource {
            client,
            endpoint: config.endpoint.clone(),
            bearer_token: config.bearer_token.clone(),
            messages_field: config.messages_field.clone(),
            max_entry_chars: config.max_entry_chars,
        })
    }

    /// Endpoint URL for `key`
    pub fn url_for(&self, key: &SubscriptionKey) -> String {
        self.endpoint.replace(KEY_PLACEHOLDER, key.as_str())
    }
}

fn classify(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = error.status() {
        FetchError::Status {
            status: status.as_u16(),
        }
    } else if error.is_connect() {
        FetchError::Connection(error.to_string())
    } else {
        FetchError::Unknown(error.to_string())
    }
}

#[async_trait]
impl LogSource for HttpLogSource {
    async fn fetch_once(&self, key: &SubscriptionKey) -> FetchResult {
        let mut request = self.client.get(self.url_for(key));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(classify)?;
        match parse_remote_log(&body, &self.messages_field, self.max_entry_chars) {
            Ok(log) => {
                if log.dropped > 0 {
                    tracing::warn!(key = %key, dropped = log.dropped, "Dropped invalid remote entries");
                }
                Ok(log)
            }
            Err(shape) => {
                tracing::warn!(key = %key, error = %shape, "Malformed remote response, treating as empty");
                Ok(RemoteLog::empty())
            }
        }
    }
}
