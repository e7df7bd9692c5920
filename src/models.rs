// src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys every canonical metrics record must carry.
pub const REQUIRED_METRIC_KEYS: [&str; 5] = [
    "rate_cut_odds",
    "vix_pctile",
    "corr_spx_dxy",
    "corr_spx_10y",
    "stance",
];

pub const DEFAULT_STANCE: &str = "Neutral";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Daily series with strictly increasing dates and no missing values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<Observation>,
}

impl TimeSeries {
    /// Builds a series from raw rows: sorts by date, drops absent or NaN
    /// values and keeps the last value seen for a repeated date.
    pub fn from_points<I>(raw: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (date, value) in raw {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                by_date.insert(date, v);
            }
        }
        TimeSeries {
            points: by_date
                .into_iter()
                .map(|(date, value)| Observation { date, value })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.points.last()
    }

    /// The trailing `n` observations (all of them if fewer).
    pub fn tail(&self, n: usize) -> TimeSeries {
        let start = self.points.len().saturating_sub(n);
        TimeSeries {
            points: self.points[start..].to_vec(),
        }
    }

    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }
}

/// Canonical record consumed by the report renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub rate_cut_odds: Option<f64>,
    pub vix_pctile: Option<f64>,
    pub corr_spx_dxy: Option<f64>,
    pub corr_spx_10y: Option<f64>,
    pub stance: String,
}

impl Default for MetricRecord {
    fn default() -> Self {
        MetricRecord {
            rate_cut_odds: None,
            vix_pctile: None,
            corr_spx_dxy: None,
            corr_spx_10y: None,
            stance: DEFAULT_STANCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHeatRecord {
    pub last7: u32,
    pub prev7: u32,
    pub delta_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EventHeatRecord {
    pub fn empty(note: impl Into<String>) -> Self {
        EventHeatRecord {
            last7: 0,
            prev7: 0,
            delta_pct: None,
            note: Some(note.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub spx_dxy: Option<f64>,
    pub spx_10y: Option<f64>,
}

/// One row of the events warehouse CSV.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub publish_time: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
}
