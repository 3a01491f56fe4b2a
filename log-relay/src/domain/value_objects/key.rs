use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::domain::services::InputValidator;

/// Rejection reasons for a malformed subscription request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Key is required")]
    EmptyKey,
    #[error("Key must be at most {max} characters (got {len})")]
    KeyTooLong { len: usize, max: usize },
    #[error("Key may only contain letters, digits, underscores and hyphens")]
    InvalidKeyCharacters,
}

/// Name of one remote message log, as chosen by the client.
///
/// Only constructible through validation, so every key held by the
/// registry or the orchestrator is known to be well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s: String = value.into();
        InputValidator::validate_key(&s)?;
        Ok(SubscriptionKey(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SubscriptionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SubscriptionKey {
    type Error = ValidationError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        SubscriptionKey::new(value)
    }
}

impl TryFrom<String> for SubscriptionKey {
    type Error = ValidationError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        SubscriptionKey::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_well_formed_key() {
        let key = SubscriptionKey::new("order_log-42").unwrap();
        assert_eq!(key.as_str(), "order_log-42");
        assert_eq!(key.to_string(), "order_log-42");
    }

    #[test]
    fn test_rejects_key_with_space() {
        assert_eq!(
            SubscriptionKey::try_from("abc def"),
            Err(ValidationError::InvalidKeyCharacters)
        );
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let key = SubscriptionKey::new("abc").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"abc\"");
    }
}
