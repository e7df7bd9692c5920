// src/services/percentile.rs
use crate::services::numeric::round_to;

/// Share of the trailing `window` observations that are at or below the
/// latest one, rounded to 4 decimals. Non-finite values are dropped first.
pub fn percentile_rank(values: &[f64], window: usize) -> Option<f64> {
    let clean: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let start = clean.len().saturating_sub(window.max(1));
    let trailing = &clean[start..];
    let latest = *trailing.last()?;

    let at_or_below = trailing.iter().filter(|v| **v <= latest).count();
    Some(round_to(at_or_below as f64 / trailing.len() as f64, 4))
}
