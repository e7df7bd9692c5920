// src/handlers/metrics.rs
use anyhow::Result;
use std::path::Path;

use super::error::PipelineError;
use crate::config::Overrides;
use crate::models::MetricRecord;
use crate::services::adapter::{CsvAgg, MetricSources, MetricsAdapter};
use crate::services::artifacts::write_json;

pub async fn emit_metrics(
    overrides: Overrides,
    sources: &MetricSources,
    prefer_env: bool,
    csv_agg: CsvAgg,
    out: &Path,
) -> Result<MetricRecord> {
    let adapter = MetricsAdapter::new(overrides, csv_agg);
    let record = adapter.build_record(sources, prefer_env).await;
    write_json(out, &record).map_err(|e| PipelineError::artifact(out, e))?;
    Ok(record)
}
