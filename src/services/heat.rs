// src/services/heat.rs
use chrono::{Duration, NaiveDate};
use log::{info, warn};
use std::path::Path;

use crate::models::{Event, EventHeatRecord};
use crate::services::numeric::round_to;
use crate::services::prices::parse_date;
use crate::BoxError;

/// Counts keyword hits in the seven days ending on the latest event's day
/// and in the seven days before that.
pub fn score(events: &[Event], keywords: &[String]) -> EventHeatRecord {
    let dated: Vec<(NaiveDate, &Event)> = events
        .iter()
        .filter_map(|e| parse_date(&e.publish_time).map(|d| (d, e)))
        .collect();

    let end = match dated.iter().map(|(d, _)| *d).max() {
        Some(end) => end,
        None => return counts_to_record(0, 0),
    };
    let start_last = end - Duration::days(6);
    let start_prev = start_last - Duration::days(7);

    let mut last7 = 0;
    let mut prev7 = 0;
    for (day, event) in &dated {
        if !is_hit(event, keywords) {
            continue;
        }
        if *day >= start_last && *day <= end {
            last7 += 1;
        } else if *day >= start_prev && *day < start_last {
            prev7 += 1;
        }
    }
    counts_to_record(last7, prev7)
}

fn is_hit(event: &Event, keywords: &[String]) -> bool {
    let text = format!("{} {}", event.title, event.summary).to_lowercase();
    keywords.iter().any(|k| text.contains(k.as_str()))
}

pub fn delta_pct(last7: u32, prev7: u32) -> Option<f64> {
    match (last7, prev7) {
        (0, 0) => None,
        (_, 0) => Some(100.0),
        (l, p) => Some(round_to((l as f64 - p as f64) / p as f64 * 100.0, 1)),
    }
}

fn counts_to_record(last7: u32, prev7: u32) -> EventHeatRecord {
    EventHeatRecord {
        last7,
        prev7,
        delta_pct: delta_pct(last7, prev7),
        note: None,
    }
}

/// Events warehouse CSV with `publish_time`, `title` and `summary` columns.
/// Returns `None` when the file does not exist.
pub fn load_events(path: &Path) -> Result<Option<Vec<Event>>, BoxError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut events = Vec::new();
    for row in rdr.deserialize::<Event>() {
        match row {
            Ok(event) => events.push(event),
            Err(e) => warn!("[heat] skipping malformed event row: {}", e),
        }
    }
    Ok(Some(events))
}

/// Scores the events file; a missing, unreadable or empty file still
/// produces a record.
pub fn score_file(path: &Path, keywords: &[String]) -> EventHeatRecord {
    let events = match load_events(path) {
        Ok(Some(events)) => events,
        Ok(None) => return EventHeatRecord::empty("events.csv not found"),
        Err(e) => {
            warn!("[heat] could not read {}: {}", path.display(), e);
            return EventHeatRecord::empty("unreadable events.csv");
        }
    };
    if events.is_empty() {
        return EventHeatRecord::empty("empty events.csv");
    }
    let record = score(&events, keywords);
    info!(
        "[heat] {} events, last7={} prev7={} delta={:?}",
        events.len(),
        record.last7,
        record.prev7,
        record.delta_pct
    );
    record
}
