//! JSON helpers for printing records.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Error type for serialization operations.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// JSON serialization failed.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// UTF-8 encoding error.
    #[error("UTF-8 encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Serializes a value to deterministic, indented JSON.
///
/// Output format:
/// - 2-space indentation
/// - Trailing newline
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json_stable<T: Serialize>(value: &T) -> Result<String, SerializationError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"  ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;

    let mut json = String::from_utf8(buffer)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use passage_domain::User;
    use pretty_assertions::assert_eq;

    fn profile() -> User {
        serde_json::from_value(serde_json::json!({
            "username": "alice",
            "login_time": "2025-05-01T10:00:00",
            "token_type": "access",
        }))
        .unwrap()
    }

    #[test]
    fn test_stable_output_has_trailing_newline() {
        let json = to_json_stable(&profile()).expect("serialization should work");
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn test_stable_output_uses_two_space_indent() {
        let json = to_json_stable(&profile()).expect("serialization should work");
        assert!(json.contains("\n  \"username\": \"alice\""));
    }

    #[test]
    fn test_extra_fields_are_sorted() {
        let json = to_json_stable(&profile()).unwrap();
        let login = json.find("login_time").unwrap();
        let token = json.find("token_type").unwrap();
        assert!(login < token);
    }

    #[test]
    fn test_user_survives_printing() {
        let json = to_json_stable(&profile()).unwrap();
        let restored: User = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, profile());
    }
}
