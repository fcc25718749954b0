//! Opaque Agent Replies
//!
//! The agent adapter's reply type is not controlled by this crate and its shape
//! varies by deployment. `RawResponse` names every shape that has been observed
//! so that the extractor can handle each one explicitly.

use serde_json::{Map, Value};
use std::fmt;

/// A reply from the agent adapter, in whichever shape the adapter produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// A reply object exposing its `output` field directly.
    DirectOutput(String),
    /// A reply object exposing `output` under a nested `data` object.
    NestedOutput(String),
    /// A key/value mapping, which may or may not carry an `output` key.
    Mapping(Map<String, Value>),
    /// Only a human-readable rendering of some internal object is available.
    OpaqueString(String),
}

impl RawResponse {
    /// Classifies a decoded JSON body.
    ///
    /// Objects are kept as mappings so the extractor can look for `output` and
    /// `data.output`; every other value is reduced to its string form.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Mapping(map),
            Value::String(text) => Self::OpaqueString(text),
            other => Self::OpaqueString(other.to_string()),
        }
    }

    /// Classifies a raw body. Bodies that are not JSON are decoded lossily.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::from_value(value),
            Err(_) => Self::OpaqueString(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

impl fmt::Display for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawResponse::DirectOutput(output) => write!(f, "AgentResponse(output='{}')", output),
            RawResponse::NestedOutput(output) => {
                write!(f, "AgentResponse(data=AgentResponseData(output='{}'))", output)
            }
            RawResponse::Mapping(map) => write!(f, "{}", Value::Object(map.clone())),
            RawResponse::OpaqueString(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_classifies_objects_as_mappings() {
        let raw = RawResponse::from_value(json!({"output": "hi"}));
        match raw {
            RawResponse::Mapping(map) => assert_eq!(map["output"], "hi"),
            other => panic!("Expected Mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_from_value_reduces_scalars_to_strings() {
        assert_eq!(
            RawResponse::from_value(json!("plain")),
            RawResponse::OpaqueString("plain".to_string())
        );
        assert_eq!(
            RawResponse::from_value(json!(42)),
            RawResponse::OpaqueString("42".to_string())
        );
    }

    #[test]
    fn test_from_bytes_falls_back_to_lossy_text() {
        let raw = RawResponse::from_bytes(b"output='ok' \xff");
        match raw {
            RawResponse::OpaqueString(text) => {
                assert!(text.starts_with("output='ok'"));
                assert!(text.contains('\u{FFFD}'));
            }
            other => panic!("Expected OpaqueString, got {:?}", other),
        }
    }

    #[test]
    fn test_display_renders_python_like_repr() {
        let direct = RawResponse::DirectOutput("4".to_string());
        assert_eq!(direct.to_string(), "AgentResponse(output='4')");

        let nested = RawResponse::NestedOutput("4".to_string());
        assert!(nested.to_string().contains("output='4'"));
    }
}
