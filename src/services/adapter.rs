// src/services/adapter.rs
//
// Builds the canonical metrics record from per-metric artifacts and
// operator environment values.
//
// File lookup policy:
//   *.json -> dotted key path (`a.b.c`) through nested objects
//   *.csv  -> named column, aggregated as the last row or the mean of the
//             parseable cells
//   other  -> abstains

use log::info;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{keys, Overrides};
use crate::models::{MetricRecord, DEFAULT_STANCE};
use crate::services::artifacts::{read_csv_column, read_json};
use crate::services::cascade::{Cascade, SourceLayer};
use crate::services::numeric::{parse_lenient, value_to_f64};
use crate::BoxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsvAgg {
    #[default]
    Last,
    Mean,
}

impl FromStr for CsvAgg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" => Ok(CsvAgg::Last),
            "mean" => Ok(CsvAgg::Mean),
            other => Err(format!("unknown csv aggregation '{}'", other)),
        }
    }
}

pub fn lookup_json_path<'v>(root: &'v Value, dotted: &str) -> Option<&'v Value> {
    dotted
        .split('.')
        .try_fold(root, |cur, key| cur.as_object().and_then(|obj| obj.get(key)))
}

pub fn load_from_json(path: &Path, key: &str) -> Result<Option<f64>, BoxError> {
    let data: Value = read_json(path)?;
    Ok(lookup_json_path(&data, key).and_then(value_to_f64))
}

pub fn load_from_csv(path: &Path, column: &str, agg: CsvAgg) -> Result<Option<f64>, BoxError> {
    let cells = read_csv_column(path, column)?;
    let value = match agg {
        CsvAgg::Last => cells.last().and_then(|c| parse_lenient(c)),
        CsvAgg::Mean => {
            let nums: Vec<f64> = cells.iter().filter_map(|c| parse_lenient(c)).collect();
            if nums.is_empty() {
                None
            } else {
                Some(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
    };
    Ok(value)
}

fn load_from_file(path: &Path, key: &str, agg: CsvAgg) -> Result<Option<f64>, BoxError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => load_from_json(path, key),
        Some("csv") => load_from_csv(path, key, agg),
        _ => Ok(None),
    }
}

/// File and key for one metric field.
#[derive(Debug, Clone, Default)]
pub struct FieldSource {
    pub path: Option<PathBuf>,
    pub key: String,
}

impl FieldSource {
    pub fn new(path: Option<PathBuf>, key: impl Into<String>) -> Self {
        FieldSource {
            path,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSources {
    pub rate_cut: FieldSource,
    pub vix: FieldSource,
    pub corr_dxy: FieldSource,
    pub corr_10y: FieldSource,
}

impl MetricSources {
    /// Artifacts written by the pipeline steps into `out_dir`.
    pub fn from_artifacts(out_dir: &Path) -> Self {
        let corr = Some(out_dir.join("corr.json"));
        MetricSources {
            rate_cut: FieldSource::new(Some(out_dir.join("polymarket_live.csv")), "prob"),
            vix: FieldSource::new(Some(out_dir.join("vix.csv")), "pctile"),
            corr_dxy: FieldSource::new(corr.clone(), "spx_dxy"),
            corr_10y: FieldSource::new(corr, "spx_10y"),
        }
    }
}

pub struct MetricsAdapter {
    overrides: Overrides,
    csv_agg: CsvAgg,
}

impl MetricsAdapter {
    pub fn new(overrides: Overrides, csv_agg: CsvAgg) -> Self {
        MetricsAdapter { overrides, csv_agg }
    }

    /// With `prefer_env`: env, file, env, none. Otherwise: file, env, none.
    pub async fn resolve_metric(
        &self,
        env_key: &str,
        file_path: Option<&Path>,
        field_key: &str,
        prefer_env: bool,
    ) -> Option<f64> {
        let env_value = self.overrides.number(env_key);
        let agg = self.csv_agg;

        let mut cascade = Cascade::new(format!("metric {}", env_key));
        if prefer_env {
            cascade = cascade.constant(format!("env {}", env_key), SourceLayer::Override, env_value);
        }
        cascade
            .attempt("file", SourceLayer::Local, move || async move {
                match file_path {
                    Some(path) => load_from_file(path, field_key, agg),
                    None => Ok(None),
                }
            })
            .constant(format!("env {} (fallback)", env_key), SourceLayer::Override, env_value)
            .resolve()
            .await
            .value
    }

    async fn resolve_field(&self, env_key: &str, source: &FieldSource, prefer_env: bool) -> Option<f64> {
        self.resolve_metric(env_key, source.path.as_deref(), &source.key, prefer_env)
            .await
    }

    pub fn resolve_stance(&self) -> String {
        self.overrides
            .get(keys::STANCE)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_STANCE.to_string())
    }

    pub async fn build_record(&self, sources: &MetricSources, prefer_env: bool) -> MetricRecord {
        let rate_cut_odds = self.resolve_field(keys::RATE_CUT_ODDS, &sources.rate_cut, prefer_env).await;
        let vix_pctile = self.resolve_field(keys::VIX_PCTILE, &sources.vix, prefer_env).await;
        let corr_spx_dxy = self.resolve_field(keys::CORR_SPX_DXY, &sources.corr_dxy, prefer_env).await;
        let corr_spx_10y = self.resolve_field(keys::CORR_SPX_10Y, &sources.corr_10y, prefer_env).await;

        let record = MetricRecord {
            rate_cut_odds,
            vix_pctile,
            corr_spx_dxy,
            corr_spx_10y,
            stance: self.resolve_stance(),
        };
        info!("[metrics] {:?}", record);
        record
    }
}
