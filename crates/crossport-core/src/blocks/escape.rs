//! Attribute-payload escaping for rewritten blocks
//!
//! A rewritten block's attributes are re-encoded as JSON for embedding in a
//! block comment. Leaf string values of the typed-data map need escaping
//! beyond plain JSON in two steps:
//!
//! 1. The structural set the comment grammar always requires: line breaks
//!    become the literal `\r\n` escape text, and angle brackets, double
//!    quote and tab become their JSON unicode escapes, so no value can
//!    terminate the surrounding HTML comment or the attribute payload.
//! 2. Non-ASCII characters the source editor stored as `\uXXXX` escape
//!    artifacts are round-tripped back to the same escape. The artifact set
//!    is discovered by scanning the raw document rather than hardcoding a
//!    character table.
//!
//! Nested array/object values are not escaped; only string leaves of the
//! data map are.
//!
//! Copyright (c) 2025 Crossport Team
//! Licensed under the Apache-2.0 license

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::DATA_ATTRIBUTE;

fn artifact_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\\u([0-9a-fA-F]{4})").expect("valid artifact pattern"))
}

/// Per-document escaping context: the set of non-ASCII characters the raw
/// document carries as unicode-escape artifacts.
#[derive(Debug, Default)]
pub struct EscapeContext {
    artifacts: HashSet<char>,
}

impl EscapeContext {
    /// Scan a raw document for `\uXXXX` occurrences and collect the
    /// non-ASCII characters they decode to.
    pub fn scan(document: &str) -> Self {
        let artifacts = artifact_pattern()
            .captures_iter(document)
            .filter_map(|caps| u32::from_str_radix(&caps[1], 16).ok())
            .filter_map(char::from_u32)
            .filter(|c| !c.is_ascii())
            .collect();
        Self { artifacts }
    }

    pub fn is_artifact(&self, c: char) -> bool {
        self.artifacts.contains(&c)
    }
}

/// Encode a rewritten block's attribute map as a comment-safe JSON payload.
/// Direct string values of the typed-data attribute get the full leaf
/// escaping; every other value is plain JSON.
pub fn encode_attrs(attrs: &Map<String, Value>, ctx: &EscapeContext) -> String {
    let mut out = String::from("{");
    for (index, (key, value)) in attrs.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        encode_plain_string(key, &mut out);
        out.push(':');
        if key == DATA_ATTRIBUTE {
            encode_data_value(value, ctx, &mut out);
        } else {
            encode_plain_value(value, &mut out);
        }
    }
    out.push('}');
    out
}

fn encode_data_value(value: &Value, ctx: &EscapeContext, out: &mut String) {
    let Value::Object(map) = value else {
        return encode_plain_value(value, out);
    };
    out.push('{');
    for (index, (key, value)) in map.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        encode_plain_string(key, out);
        out.push(':');
        match value {
            Value::String(s) => {
                out.push('"');
                escape_leaf(s, ctx, out);
                out.push('"');
            }
            nested => encode_plain_value(nested, out),
        }
    }
    out.push('}');
}

fn encode_plain_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => encode_plain_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                encode_plain_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (index, (key, value)) in map.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                encode_plain_string(key, out);
                out.push(':');
                encode_plain_value(value, out);
            }
            out.push('}');
        }
    }
}

/// Leaf escaping: structural set plus discovered unicode artifacts.
pub fn escape_leaf(value: &str, ctx: &EscapeContext, out: &mut String) {
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\r\\n");
            }
            '\n' => out.push_str("\\r\\n"),
            '\t' => out.push_str("\\u0009"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '"' => out.push_str("\\u0022"),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c if !c.is_ascii() && ctx.is_artifact(c) => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}

/// Plain JSON string encoding, quotes included.
fn encode_plain_string(value: &str, out: &mut String) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(value: &str, ctx: &EscapeContext) -> String {
        let mut out = String::new();
        escape_leaf(value, ctx, &mut out);
        out
    }

    #[test]
    fn test_line_breaks_never_survive_raw() {
        let ctx = EscapeContext::default();
        assert_eq!(leaf("a\nb", &ctx), "a\\r\\nb");
        assert_eq!(leaf("a\r\nb", &ctx), "a\\r\\nb");
        assert_eq!(leaf("a\rb", &ctx), "a\\r\\nb");
    }

    #[test]
    fn test_structural_characters_escape_to_unicode() {
        let ctx = EscapeContext::default();
        assert_eq!(leaf("<b>\"x\"\t</b>", &ctx), "\\u003cb\\u003e\\u0022x\\u0022\\u0009\\u003c/b\\u003e");
    }

    #[test]
    fn test_artifact_scan_picks_up_escaped_characters() {
        // Raw strings keep the backslash: the document carries the escape
        // text itself, the way the origin editor stored it.
        let ctx = EscapeContext::scan(r#"{"data":{"name":"caf\u00e9","dash":"a \u2013 b"}}"#);
        assert!(ctx.is_artifact('\u{00e9}'));
        assert!(ctx.is_artifact('\u{2013}'));
        assert!(!ctx.is_artifact('a'));
    }

    #[test]
    fn test_artifacts_round_trip_to_escapes() {
        let ctx = EscapeContext::scan(r#"prior caf\u00e9 artifact"#);
        assert_eq!(leaf("café", &ctx), r#"caf\u00e9"#);
        // A non-ASCII character the document never carried as an escape
        // stays raw.
        assert_eq!(leaf("naïve", &ctx), "naïve");
    }

    #[test]
    fn test_data_leaves_escaped_nested_values_plain() {
        let ctx = EscapeContext::default();
        let attrs = json!({
            "data": {
                "title": "a<b",
                "_title": "field_1",
                "rows": [{ "text": "x<y" }]
            },
            "mode": "edit"
        });
        let encoded = encode_attrs(attrs.as_object().unwrap(), &ctx);
        assert_eq!(
            encoded,
            r#"{"data":{"title":"a\u003cb","_title":"field_1","rows":[{"text":"x<y"}]},"mode":"edit"}"#
        );
    }

    #[test]
    fn test_encoded_attrs_reparse() {
        let ctx = EscapeContext::default();
        let attrs = json!({ "data": { "title": "line\nbreak" } });
        let encoded = encode_attrs(attrs.as_object().unwrap(), &ctx);
        // The literal \r\n text decodes back to CR LF under a JSON parser,
        // which is what the destination editor expects.
        let decoded: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded["data"]["title"], "line\r\nbreak");
    }
}
