// src/services/numeric.rs
use serde_json::Value;

/// Lenient number parsing used by every file and environment layer.
/// Trims, strips percent signs and rejects NaN, infinities and empty input.
pub fn parse_lenient(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace('%', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Same policy applied to a JSON value: numbers pass, strings are parsed,
/// everything else is absent.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_lenient(s),
        _ => None,
    }
}

pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
