//! Response normalization: unwrap JSON envelopes, pick the narrative field,
//! clean HTML residue.

use super::record::NarrativeSource;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Keys probed for the narrative, in priority order.
pub const NARRATIVE_KEYS: &[&str] = &[
    "analysis",
    "output",
    "text",
    "message",
    "content",
    "recommendation",
    "result",
];

const MAX_UNWRAP_DEPTH: usize = 3;

static BR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("br regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:/?[A-Za-z][^<>]*|!--[^<>]*)>").expect("tag regex"));
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(?:nbsp|amp|lt|gt|quot);").expect("entity regex"));
static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("newline regex"));

/// The narrative text plus the JSON objects it was found in.
#[derive(Debug, Clone, Default)]
pub struct NormalizedResponse {
    pub narrative: String,
    pub source: NarrativeSource,
    /// Objects walked to reach the narrative, innermost first.
    layers: Vec<Map<String, Value>>,
}

impl NormalizedResponse {
    /// Look up a structured field, innermost object first. Nulls count as absent.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.layers
            .iter()
            .filter_map(|obj| obj.get(key))
            .find(|v| !v.is_null())
    }

    /// A field as trimmed text; numbers are rendered, empty strings are absent.
    pub fn field_str(&self, key: &str) -> Option<String> {
        let s = match self.field(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!s.is_empty()).then_some(s)
    }

    /// A field as a number; numeric strings like "85%" or "2u" are accepted.
    pub fn field_f64(&self, key: &str) -> Option<f64> {
        match self.field(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => super::fields::leading_number(s),
            _ => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        !self.layers.is_empty()
    }
}

/// Normalize a raw webhook body. Never fails: unparseable input is narrative text.
pub fn normalize_response(body: &str) -> NormalizedResponse {
    let mut layers = Vec::new();
    let (narrative, source) = resolve_text(body, &mut layers, 0);
    layers.reverse();
    NormalizedResponse {
        narrative: clean_html(&narrative),
        source,
        layers,
    }
}

fn resolve_text(text: &str, layers: &mut Vec<Map<String, Value>>, depth: usize) -> (String, NarrativeSource) {
    if depth < MAX_UNWRAP_DEPTH {
        if let Some(value) = parse_embedded_json(text) {
            if let Some(resolved) = resolve_value(value, layers, depth) {
                return resolved;
            }
        }
    }
    (text.to_string(), NarrativeSource::RawText)
}

/// Returns `None` when the value carries nothing usable (raw-text fallback).
fn resolve_value(
    value: Value,
    layers: &mut Vec<Map<String, Value>>,
    depth: usize,
) -> Option<(String, NarrativeSource)> {
    let value = match value {
        Value::Array(items) => items.into_iter().next()?,
        other => other,
    };

    match value {
        Value::String(s) => Some(resolve_text(&s, layers, depth + 1)),
        Value::Object(map) => Some(resolve_object(map, layers, depth)),
        _ => None,
    }
}

fn resolve_object(
    map: Map<String, Value>,
    layers: &mut Vec<Map<String, Value>>,
    depth: usize,
) -> (String, NarrativeSource) {
    let found = NARRATIVE_KEYS
        .iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()).map(|v| (*key, v.clone())));
    layers.push(map);

    let Some((key, value)) = found else {
        tracing::warn!("webhook payload has no known narrative field; showing raw object");
        let pretty = layers
            .last()
            .and_then(|obj| serde_json::to_string_pretty(obj).ok())
            .unwrap_or_default();
        return (pretty, NarrativeSource::PrettyPrinted);
    };

    let field_source = NarrativeSource::Field(key.to_string());
    match value {
        Value::String(s) => {
            if depth + 1 < MAX_UNWRAP_DEPTH {
                if let Some(inner) = parse_embedded_json(&s) {
                    if let Some(resolved) = resolve_value(inner, layers, depth + 1) {
                        return resolved;
                    }
                }
            }
            (s, field_source)
        }
        Value::Object(_) | Value::Array(_) if depth + 1 < MAX_UNWRAP_DEPTH => {
            match resolve_value(value.clone(), layers, depth + 1) {
                Some(resolved) => resolved,
                None => (pretty_or_plain(&value), field_source),
            }
        }
        other => (pretty_or_plain(&other), field_source),
    }
}

fn pretty_or_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(_) | Value::Bool(_) => value.to_string(),
        _ => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

/// Parse text as a JSON object or array, tolerating a surrounding markdown
/// code fence. Scalars are not treated as structured.
fn parse_embedded_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let candidate = strip_code_fence(trimmed).unwrap_or(trimmed);
    if !(candidate.starts_with('{') || candidate.starts_with('[')) {
        return None;
    }
    let value: Value = serde_json::from_str(candidate).ok()?;
    matches!(value, Value::Object(_) | Value::Array(_)).then_some(value)
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let body_start = rest.find('\n')? + 1;
    let body = rest[body_start..].trim_end().strip_suffix("```")?;
    Some(body.trim())
}

/// Strip HTML tags and decode the common entities in one ordered pass: `<br>`
/// to newline, then tags, then entities. Entities are decoded once, so
/// escaped markup such as `&amp;lt;br&amp;gt;` comes out as `&lt;br&gt;`
/// and text that decodes to `<b>` is kept as literal text.
pub fn clean_html(text: &str) -> String {
    let s = text.replace("\r\n", "\n");
    let s = BR_TAG.replace_all(&s, "\n");
    let s = HTML_TAG.replace_all(&s, "");
    let s = ENTITY.replace_all(&s, |caps: &regex::Captures| {
        match &caps[0] {
            "&nbsp;" => " ",
            "&amp;" => "&",
            "&lt;" => "<",
            "&gt;" => ">",
            _ => "\"",
        }
        .to_string()
    });
    let s = EXCESS_NEWLINES.replace_all(&s, "\n\n");
    s.trim().to_string()
}
