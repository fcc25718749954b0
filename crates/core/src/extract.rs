//! Response Extraction
//!
//! Recovers the textual payload from a [`RawResponse`] through a fixed chain of
//! tiers, first match wins:
//!
//! 1. an `output` field exposed directly,
//! 2. an `output` field nested under `data`,
//! 3. `output='<captured>'` in the string form,
//! 4. `output=<captured>,` in the string form,
//! 5. everything after `output=` up to the next comma or the end,
//! 6. the full string form, verbatim.
//!
//! Extraction never fails. The later tiers scrape a foreign object's debug
//! rendering and can capture a truncated fragment (an embedded comma ends tiers
//! 4 and 5 early); that is accepted in exchange for always returning some text.

use crate::response::RawResponse;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

static QUOTED_OUTPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"output='([^']+)'").unwrap());
static COMMA_TERMINATED_OUTPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"output=([^,]+),").unwrap());

const OUTPUT_MARKER: &str = "output=";

/// The tier of the extraction chain that produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    Direct,
    Nested,
    QuotedOutput,
    CommaTerminatedOutput,
    OpenEndedOutput,
    Verbatim,
}

/// Extracts the text payload and unescapes literal `\n` and `\t` sequences.
pub fn extract_content(response: &RawResponse) -> String {
    let (tier, content) = locate_output(response);
    match tier {
        ExtractionTier::Direct | ExtractionTier::Nested => {
            debug!(?tier, "extracted agent output")
        }
        ExtractionTier::Verbatim => {
            warn!("agent reply has no recognizable output; using its full string form")
        }
        _ => debug!(?tier, "scraped agent output from its string form"),
    }
    unescape(&content)
}

/// Runs the tier chain without post-processing.
pub fn locate_output(response: &RawResponse) -> (ExtractionTier, String) {
    match response {
        RawResponse::DirectOutput(output) => return (ExtractionTier::Direct, output.clone()),
        RawResponse::NestedOutput(output) => return (ExtractionTier::Nested, output.clone()),
        RawResponse::Mapping(map) => {
            if let Some(output) = direct_field(map) {
                return (ExtractionTier::Direct, output);
            }
            if let Some(output) = nested_field(map) {
                return (ExtractionTier::Nested, output);
            }
        }
        RawResponse::OpaqueString(_) => {}
    }

    let rendered = response.to_string();
    if let Some(output) = quoted_output(&rendered) {
        return (ExtractionTier::QuotedOutput, output.to_string());
    }
    if let Some(output) = comma_terminated_output(&rendered) {
        return (ExtractionTier::CommaTerminatedOutput, output);
    }
    if let Some(output) = open_ended_output(&rendered) {
        return (ExtractionTier::OpenEndedOutput, output);
    }
    (ExtractionTier::Verbatim, rendered)
}

fn direct_field(map: &Map<String, Value>) -> Option<String> {
    map.get("output").and_then(value_text)
}

fn nested_field(map: &Map<String, Value>) -> Option<String> {
    map.get("data")
        .and_then(Value::as_object)
        .and_then(|data| data.get("output"))
        .and_then(value_text)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Matches `output='<captured>'`; the capture must be non-empty.
pub fn quoted_output(rendered: &str) -> Option<&str> {
    QUOTED_OUTPUT
        .captures(rendered)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Matches `output=<captured>,` and strips enclosing single quotes.
pub fn comma_terminated_output(rendered: &str) -> Option<String> {
    COMMA_TERMINATED_OUTPUT
        .captures(rendered)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim_matches('\'').to_string())
}

/// Takes everything after `output=` up to the next comma, or to the end of the
/// string, and strips enclosing single quotes.
pub fn open_ended_output(rendered: &str) -> Option<String> {
    let start = rendered.find(OUTPUT_MARKER)? + OUTPUT_MARKER.len();
    let rest = &rendered[start..];
    let captured = match rest.find(',') {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(captured.trim_matches('\'').to_string())
}

/// Turns literal `\n` and `\t` escape sequences into real newlines and tabs.
pub fn unescape(content: &str) -> String {
    content.replace("\\n", "\n").replace("\\t", "\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(value: Value) -> RawResponse {
        RawResponse::from_value(value)
    }

    #[test]
    fn test_quoted_output_pattern() {
        assert_eq!(
            quoted_output("AgentResponse(status='SUCCESS', output='4', run_time=1.2)"),
            Some("4")
        );
        // An empty quoted capture is not a match.
        assert_eq!(quoted_output("output='', status='FAILED'"), None);
        assert_eq!(quoted_output("no marker here"), None);
    }

    #[test]
    fn test_comma_terminated_output_pattern() {
        assert_eq!(
            comma_terminated_output("Response(output=Paris, status=done)"),
            Some("Paris".to_string())
        );
        // Enclosing quotes are stripped even when they are unbalanced.
        assert_eq!(
            comma_terminated_output("Response(output='it, status=done)"),
            Some("it".to_string())
        );
        assert_eq!(comma_terminated_output("Response(output=Paris)"), None);
    }

    #[test]
    fn test_open_ended_output_pattern() {
        assert_eq!(
            open_ended_output("Response(output=Paris)"),
            Some("Paris)".to_string())
        );
        assert_eq!(open_ended_output("output='tail'"), Some("tail".to_string()));
        assert_eq!(open_ended_output("output=,rest"), Some(String::new()));
        assert_eq!(open_ended_output("nothing"), None);
    }

    #[test]
    fn test_tier_priority_direct_before_nested() {
        let raw = mapping(json!({"output": "top", "data": {"output": "inner"}}));
        assert_eq!(
            locate_output(&raw),
            (ExtractionTier::Direct, "top".to_string())
        );
    }

    #[test]
    fn test_mapping_with_nested_output() {
        let raw = mapping(json!({"status": "SUCCESS", "data": {"output": "inner"}}));
        assert_eq!(
            locate_output(&raw),
            (ExtractionTier::Nested, "inner".to_string())
        );
    }

    #[test]
    fn test_mapping_null_output_falls_through() {
        let raw = mapping(json!({"output": null, "data": {"output": "inner"}}));
        assert_eq!(locate_output(&raw).0, ExtractionTier::Nested);
    }

    #[test]
    fn test_mapping_without_output_uses_string_form() {
        let raw = mapping(json!({"status": "FAILED"}));
        let (tier, text) = locate_output(&raw);
        assert_eq!(tier, ExtractionTier::Verbatim);
        assert_eq!(text, r#"{"status":"FAILED"}"#);
    }

    #[test]
    fn test_opaque_string_tiers_in_order() {
        let quoted = RawResponse::OpaqueString("x(output='a', y=1)".to_string());
        assert_eq!(locate_output(&quoted).0, ExtractionTier::QuotedOutput);

        let comma = RawResponse::OpaqueString("x(output=a, y=1)".to_string());
        assert_eq!(locate_output(&comma).0, ExtractionTier::CommaTerminatedOutput);

        let open = RawResponse::OpaqueString("x(output=a)".to_string());
        assert_eq!(locate_output(&open).0, ExtractionTier::OpenEndedOutput);

        let verbatim = RawResponse::OpaqueString("just text".to_string());
        assert_eq!(
            locate_output(&verbatim),
            (ExtractionTier::Verbatim, "just text".to_string())
        );
    }

    #[test]
    fn test_all_shapes_yield_the_same_text() {
        let expected = "Line one\nLine two";
        let escaped = "Line one\\nLine two";
        let shapes = [
            RawResponse::DirectOutput(escaped.to_string()),
            RawResponse::NestedOutput(escaped.to_string()),
            mapping(json!({"output": escaped})),
            mapping(json!({"data": {"output": escaped}})),
            RawResponse::OpaqueString(format!(
                "AgentResponse(status='SUCCESS', output='{}', run_time=0.5)",
                escaped
            )),
        ];
        for shape in &shapes {
            assert_eq!(extract_content(shape), expected, "shape: {:?}", shape);
        }
    }

    #[test]
    fn test_unescape_handles_newlines_and_tabs() {
        assert_eq!(unescape("a\\nb\\tc"), "a\nb\tc");
        assert_eq!(unescape("already\nreal"), "already\nreal");
    }
}
