// src/handlers/pipeline.rs
use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use std::path::PathBuf;

use super::correlation::run_correlation_step;
use super::heat::run_heat_step;
use super::metrics::emit_metrics;
use super::odds::run_odds_step;
use super::report::{render_report, RenderOptions};
use super::vix::run_vix_step;
use crate::config::PipelineConfig;
use crate::models::MetricRecord;
use crate::services::adapter::{CsvAgg, MetricSources};
use crate::services::http::build_client;
use crate::services::report::ReportPaths;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub report_dir: PathBuf,
    pub title: String,
    pub allow_na: bool,
    pub as_of: NaiveDate,
    pub asset_root: PathBuf,
}

#[derive(Debug)]
pub struct RunSummary {
    pub metrics: MetricRecord,
    pub report: ReportPaths,
}

/// Every step in order: per-metric artifacts, canonical record, report.
pub async fn run_pipeline(cfg: &PipelineConfig, opts: &RunOptions) -> Result<RunSummary> {
    let client = build_client(cfg.http_timeout).map_err(|e| anyhow::anyhow!(e))?;
    info!("Running pipeline into {} (offline: {})", cfg.out_dir.display(), cfg.offline);

    run_odds_step(cfg, &client).await?;
    run_vix_step(cfg, &client).await?;
    run_correlation_step(cfg, &client).await?;
    run_heat_step(&cfg.events_csv, &cfg.keywords_config, &cfg.heat_json())?;

    let metrics = emit_metrics(
        cfg.overrides.clone(),
        &MetricSources::from_artifacts(&cfg.out_dir),
        true,
        CsvAgg::Last,
        &cfg.metrics_json(),
    )
    .await?;

    let report = render_report(&RenderOptions {
        metrics: cfg.metrics_json(),
        events: cfg.heat_json(),
        outdir: opts.report_dir.clone(),
        title: opts.title.clone(),
        allow_na: opts.allow_na,
        as_of: opts.as_of,
        asset_root: opts.asset_root.clone(),
    })?;

    Ok(RunSummary { metrics, report })
}
