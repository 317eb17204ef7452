//! Best-effort parsing of JSON embedded in LLM responses.
//!
//! Models asked for JSON often wrap it in Markdown fences or surround it
//! with prose. Parsing tries progressively looser strategies and falls back
//! to the `"NA"` sentinel instead of failing.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Value returned when no JSON could be recovered.
pub const SENTINEL: &str = "NA";

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid regex"))
}

fn object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"))
}

fn array_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"))
}

fn score_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)"?score"?\s*[:=]\s*"?(-?\d+(?:\.\d+)?)"#).expect("valid regex")
    })
}

fn out_of_ten_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*10\b").expect("valid regex"))
}

/// The sentinel as a JSON value.
pub fn sentinel() -> Value {
    Value::String(SENTINEL.to_string())
}

/// Whether `value` is the parse-failure sentinel.
pub fn is_sentinel(value: &Value) -> bool {
    value.as_str() == Some(SENTINEL)
}

/// Recover a JSON object or array from free-form model output.
///
/// Order: whole text, fenced block, outermost `{...}`, outermost `[...]`.
/// Bare scalars (numbers, strings) don't count as structured output.
pub fn extract_json(text: &str) -> Value {
    let trimmed = text.trim();

    if let Some(value) = parse_structured(trimmed) {
        return value;
    }

    if let Some(inner) = fence_re().captures(trimmed).and_then(|c| c.get(1)) {
        if let Some(value) = parse_structured(inner.as_str()) {
            return value;
        }
    }

    for re in [object_re(), array_re()] {
        if let Some(m) = re.find(trimmed) {
            if let Some(value) = parse_structured(m.as_str()) {
                return value;
            }
        }
    }

    tracing::debug!("No JSON found in response ({} chars)", text.len());
    sentinel()
}

fn parse_structured(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Pull a numeric score out of judge output.
pub fn extract_score(text: &str) -> Option<f64> {
    if let Value::Object(map) = extract_json(text) {
        match map.get("score") {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(score) = s.trim().parse::<f64>() {
                    return Some(score);
                }
            }
            _ => {}
        }
    }

    score_re()
        .captures(text)
        .or_else(|| out_of_ten_re().captures(text))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Pull the judge's reasoning, falling back to the raw text.
pub fn extract_reasoning(text: &str) -> String {
    if let Value::Object(map) = extract_json(text) {
        if let Some(Value::String(reasoning)) = map.get("reasoning") {
            return reasoning.trim().to_string();
        }
    }
    text.trim().to_string()
}
