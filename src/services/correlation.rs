// src/services/correlation.rs
use crate::models::TimeSeries;
use crate::services::numeric::round_to;

/// Pearson correlation of the last `window` simple returns of two series,
/// aligned on shared dates. `None` when fewer than `window` aligned rows
/// exist or either return sequence has no variance.
pub fn rolling_correlation(a: &TimeSeries, b: &TimeSeries, window: usize) -> Option<f64> {
    let aligned: Vec<(f64, f64)> = a
        .points()
        .iter()
        .filter_map(|p| b.value_on(p.date).map(|other| (p.value, other)))
        .collect();

    if window == 0 || aligned.len() < window {
        return None;
    }

    let returns: Vec<(f64, f64)> = aligned
        .windows(2)
        .filter_map(|pair| {
            let (a0, b0) = pair[0];
            let (a1, b1) = pair[1];
            let ra = a1 / a0 - 1.0;
            let rb = b1 / b0 - 1.0;
            (ra.is_finite() && rb.is_finite()).then_some((ra, rb))
        })
        .collect();

    let start = returns.len().saturating_sub(window);
    pearson(&returns[start..]).map(|r| round_to(r, 4))
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        TimeSeries::from_points(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), Some(*v))),
        )
    }

    fn wiggle(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1).collect()
    }

    #[test]
    fn identical_series_correlate_perfectly() {
        let s = series(&wiggle(40));
        for window in [2, 10, 39, 40] {
            assert_eq!(rolling_correlation(&s, &s, window), Some(1.0), "window {window}");
        }
    }

    #[test]
    fn mirrored_returns_correlate_negatively() {
        let a = wiggle(30);
        let b: Vec<f64> = a.windows(2).fold(vec![100.0], |mut acc, w| {
            let r = w[1] / w[0] - 1.0;
            let last = *acc.last().unwrap();
            acc.push(last * (1.0 - r));
            acc
        });
        assert_eq!(rolling_correlation(&series(&a), &series(&b), 20), Some(-1.0));
    }

    #[test]
    fn short_series_is_unknown() {
        let s = series(&wiggle(5));
        assert_eq!(rolling_correlation(&s, &s, 6), None);
    }

    #[test]
    fn aligns_on_shared_dates_only() {
        let a = series(&wiggle(20));
        let start = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        let b = TimeSeries::from_points((0..20).map(|i| (start + Duration::days(i), Some(50.0 + i as f64))));
        // ten shared dates
        assert_eq!(rolling_correlation(&a, &b, 11), None);
        assert!(rolling_correlation(&a, &b, 10).is_some());
    }

    #[test]
    fn flat_series_has_no_correlation() {
        let a = series(&[1.0; 10]);
        let b = series(&wiggle(10));
        assert_eq!(rolling_correlation(&a, &b, 5), None);
    }

    #[test]
    fn reproducible() {
        let a = series(&wiggle(60));
        let b = series(&wiggle(60).iter().map(|v| v * v).collect::<Vec<_>>());
        assert_eq!(rolling_correlation(&a, &b, 30), rolling_correlation(&a, &b, 30));
    }
}
