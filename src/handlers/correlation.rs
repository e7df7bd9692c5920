// src/handlers/correlation.rs
use anyhow::Result;
use log::info;
use reqwest::Client;

use super::error::PipelineError;
use crate::config::PipelineConfig;
use crate::models::CorrelationRecord;
use crate::services::artifacts::write_json;
use crate::services::cross_asset::resolve_correlations;

pub async fn run_correlation_step(cfg: &PipelineConfig, client: &Client) -> Result<CorrelationRecord> {
    info!("Resolving SPX correlations (window {})", cfg.corr_window);
    let run = resolve_correlations(cfg, client).await;
    let record = run.record();

    let path = cfg.corr_json();
    write_json(&path, &record).map_err(|e| PipelineError::artifact(&path, e))?;
    run.refresh_caches(cfg)
        .map_err(|e| PipelineError::artifact(&cfg.last_good_dir, e))?;
    info!("[corr] {:?}", record);
    Ok(record)
}
