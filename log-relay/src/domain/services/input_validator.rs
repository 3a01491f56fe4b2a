use crate::domain::value_objects::ValidationError;

/// Longest accepted subscription key, in characters
pub const MAX_KEY_CHARS: usize = 100;

/// Longest free-form request field kept after sanitization, in characters
pub const MAX_FIELD_CHARS: usize = 10_000;

/// Stateless gate for subscription input
pub struct InputValidator;

impl InputValidator {
    /// A key is valid iff it is 1..=100 characters of `[A-Za-z0-9_-]`.
    pub fn validate_key(key: &str) -> Result<(), ValidationError> {
        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }

        let len = key.chars().count();
        if len > MAX_KEY_CHARS {
            return Err(ValidationError::KeyTooLong {
                len,
                max: MAX_KEY_CHARS,
            });
        }

        if !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ValidationError::InvalidKeyCharacters);
        }

        Ok(())
    }

    /// Narrow a free-form field: drop angle brackets, trim, truncate.
    ///
    /// Never fails.
    pub fn sanitize(input: &str) -> String {
        let stripped: String = input.chars().filter(|c| !matches!(c, '<' | '>')).collect();
        stripped.trim().chars().take(MAX_FIELD_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_boundaries() {
        assert!(InputValidator::validate_key("a").is_ok());
        assert!(InputValidator::validate_key(&"k".repeat(100)).is_ok());
        assert_eq!(
            InputValidator::validate_key(&"k".repeat(101)),
            Err(ValidationError::KeyTooLong { len: 101, max: 100 })
        );
        assert_eq!(
            InputValidator::validate_key(""),
            Err(ValidationError::EmptyKey)
        );
    }

    #[test]
    fn test_validate_key_character_set() {
        assert!(InputValidator::validate_key("Abc_123-xyz").is_ok());

        for bad in ["abc def", "abc/def", "abc.def", "<script>", "ключ", "a\tb"] {
            assert_eq!(
                InputValidator::validate_key(bad),
                Err(ValidationError::InvalidKeyCharacters),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_sanitize_strips_brackets_and_trims() {
        assert_eq!(
            InputValidator::sanitize("  <b>hello</b>  "),
            "bhello/b"
        );
        assert_eq!(InputValidator::sanitize("   "), "");
    }

    #[test]
    fn test_sanitize_truncates_long_input() {
        let long = "x".repeat(MAX_FIELD_CHARS + 50);
        assert_eq!(InputValidator::sanitize(&long).chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn test_sanitize_does_not_fix_inner_whitespace() {
        let sanitized = InputValidator::sanitize(" abc def ");
        assert_eq!(sanitized, "abc def");
        assert!(InputValidator::validate_key(&sanitized).is_err());
    }
}
