// src/services/prices.rs
//
// Daily price series from local CSV files, the Stooq CSV download and the
// Yahoo v8 chart API.
//
// Column resolution policy for CSV input (headers are trimmed and
// lowercased before matching):
//   date  -> first of `date`, `data`, `czas`
//   close -> first of `close`, `zamkniecie`, `last`; when none is present and
//            the caller allows it, the last column is taken as close.
// Rows whose date or close does not parse are dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use log::info;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;

use crate::models::TimeSeries;
use crate::services::artifacts::write_atomic;
use crate::services::http::fetch_text;
use crate::services::numeric::parse_lenient;
use crate::BoxError;

const DATE_COLUMNS: [&str; 3] = ["date", "data", "czas"];
const CLOSE_COLUMNS: [&str; 3] = ["close", "zamkniecie", "last"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseFallback {
    /// Use the last column when no known close header exists.
    LastColumn,
    /// Treat a missing close header as a schema error.
    Strict,
}

/// Returns `(date_idx, close_idx)` for the given header row.
pub fn resolve_columns(headers: &[String], fallback: CloseFallback) -> Result<(usize, usize), BoxError> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let find = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| normalized.iter().position(|h| h.as_str() == *name))
    };

    let date_idx = find(&DATE_COLUMNS[..])
        .ok_or_else(|| format!("no date column in {:?}", normalized))?;
    let close_idx = match find(&CLOSE_COLUMNS[..]) {
        Some(idx) => idx,
        None if fallback == CloseFallback::LastColumn && normalized.len() > 1 => normalized.len() - 1,
        None => return Err(format!("no close column in {:?}", normalized).into()),
    };
    if close_idx == date_idx {
        return Err("close column resolves to the date column".into());
    }
    Ok((date_idx, close_idx))
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and RFC 3339.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_datetime(raw).map(|dt| dt.date())
}

pub fn parse_price_csv(text: &str, fallback: CloseFallback) -> Result<TimeSeries, BoxError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let (date_idx, close_idx) = resolve_columns(&headers, fallback)?;

    let mut raw = Vec::new();
    for record in rdr.records() {
        let row = record?;
        let date = match row.get(date_idx).and_then(parse_date) {
            Some(d) => d,
            None => continue,
        };
        raw.push((date, row.get(close_idx).and_then(parse_lenient)));
    }
    Ok(TimeSeries::from_points(raw))
}

/// Operator-supplied or previously cached CSV. A missing file abstains.
pub fn load_local_csv(path: &Path) -> Result<Option<TimeSeries>, BoxError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let series = parse_price_csv(&text, CloseFallback::LastColumn)?;
    info!("Loaded {} rows from {}", series.len(), path.display());
    Ok(Some(series))
}

pub fn write_series_csv(path: &Path, series: &TimeSeries) -> Result<(), BoxError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["date", "close"])?;
    for p in series.points() {
        wtr.write_record([p.date.format("%Y-%m-%d").to_string(), p.value.to_string()])?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.to_string())?;
    write_atomic(path, &bytes)?;
    Ok(())
}

pub async fn fetch_stooq_csv(client: &Client, url: &str) -> Result<TimeSeries, BoxError> {
    let text = fetch_text(client, url).await?;
    parse_price_csv(&text, CloseFallback::Strict)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

pub fn parse_yahoo_chart(body: &str) -> Result<TimeSeries, BoxError> {
    let resp: ChartResponse = serde_json::from_str(body)?;
    let data = match resp.chart.result {
        Some(results) => results
            .into_iter()
            .next()
            .ok_or("chart result array is empty")?,
        None => {
            return Err(match resp.chart.error {
                Some(err) => format!("{}: {}", err.code, err.description).into(),
                None => "empty chart result with no error".into(),
            })
        }
    };

    let timestamps = data.timestamp.ok_or("chart has no timestamps")?;
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or("chart has no quote block")?;

    let raw = timestamps
        .iter()
        .zip(quote.close)
        .filter_map(|(ts, close)| DateTime::from_timestamp(*ts, 0).map(|dt| (dt.date_naive(), close)));
    Ok(TimeSeries::from_points(raw))
}

/// Smallest Yahoo chart range holding `trading_days` sessions, at roughly
/// 252 sessions a year with some slack for holidays.
pub fn history_range(trading_days: usize) -> &'static str {
    match trading_days {
        0..=240 => "1y",
        241..=480 => "2y",
        481..=1200 => "5y",
        1201..=2400 => "10y",
        _ => "max",
    }
}

pub fn yahoo_chart_url(base: &str, symbol: &str, range: &str) -> String {
    format!(
        "{}/{}?range={}&interval=1d",
        base.trim_end_matches('/'),
        symbol.replace('^', "%5E").replace('=', "%3D"),
        range
    )
}

pub async fn fetch_yahoo_chart(client: &Client, base: &str, symbol: &str, range: &str) -> Result<TimeSeries, BoxError> {
    let url = yahoo_chart_url(base, symbol, range);
    let body = fetch_text(client, &url).await?;
    parse_yahoo_chart(&body)
}
