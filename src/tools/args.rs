//! Structured decoding of tool and UI-action payloads.
//!
//! Payloads reach us either as parsed JSON or as JSON text (models and UI
//! hosts do both). Everything is decoded here, once, into a typed struct.

use crate::error::ResearchError;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode a payload that is either a JSON value or a string holding JSON.
pub fn decode_args<T: DeserializeOwned>(raw: &Value) -> Result<T> {
    match raw {
        Value::String(text) => {
            let parsed: Value = serde_json::from_str(text.trim()).map_err(|e| {
                ResearchError::InvalidToolInput(format!("payload is not valid JSON: {}", e))
            })?;
            if parsed.is_string() {
                return Err(ResearchError::InvalidToolInput(
                    "payload is a doubly encoded string".to_string(),
                ));
            }
            decode_value(parsed)
        }
        Value::Null => decode_value(Value::Object(Default::default())),
        other => decode_value(other.clone()),
    }
}

fn decode_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ResearchError::InvalidToolInput(format!("unexpected payload shape: {}", e)))
}

/// `deserialize_with` adapter for fields that may be nested JSON text.
pub fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    decode_args(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct QueryArgs {
        query: String,
        #[serde(default)]
        limit: Option<usize>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(deserialize_with = "lenient")]
        inner: QueryArgs,
    }

    #[test]
    fn test_object_and_text_decode_identically() {
        let object = json!({"query": "Apple", "limit": 3});
        let text = Value::String(object.to_string());

        let a: QueryArgs = decode_args(&object).unwrap();
        let b: QueryArgs = decode_args(&text).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.limit, Some(3));
    }

    #[test]
    fn test_malformed_text_is_invalid_input() {
        let result: Result<QueryArgs> = decode_args(&Value::String("{query: nope".into()));
        assert!(matches!(result, Err(ResearchError::InvalidToolInput(_))));
    }

    #[test]
    fn test_missing_field_is_invalid_input() {
        let result: Result<QueryArgs> = decode_args(&json!({"limit": 2}));
        assert!(matches!(result, Err(ResearchError::InvalidToolInput(_))));
    }

    #[test]
    fn test_nested_lenient_field() {
        let nested_text = json!({"inner": "{\"query\":\"MSFT\"}"});
        let nested_object = json!({"inner": {"query": "MSFT"}});

        let a: Wrapper = decode_args(&nested_text).unwrap();
        let b: Wrapper = decode_args(&nested_object).unwrap();
        assert_eq!(a, b);
    }
}
