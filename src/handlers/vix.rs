// src/handlers/vix.rs
use anyhow::Result;
use log::{info, warn};
use reqwest::Client;

use super::error::PipelineError;
use crate::config::PipelineConfig;
use crate::services::artifacts::write_single_value_csv;
use crate::services::vix::resolve_vix_pctile;

pub async fn run_vix_step(cfg: &PipelineConfig, client: &Client) -> Result<Option<f64>> {
    info!("Resolving VIX percentile (window {})", cfg.vix_window);
    let resolved = resolve_vix_pctile(cfg, client).await;
    if !resolved.is_resolved() {
        warn!("[vix] no layer produced a value, writing an empty pctile");
    }

    let path = cfg.vix_csv();
    write_single_value_csv(&path, "pctile", resolved.value)
        .map_err(|e| PipelineError::artifact(&path, e))?;
    if let Some(fetched) = resolved.fetched() {
        let last_good = cfg.last_good_vix();
        write_single_value_csv(&last_good, "pctile", Some(*fetched))
            .map_err(|e| PipelineError::artifact(&last_good, e))?;
    }
    info!("[vix] {:?} via {}", resolved.value, resolved.label.as_deref().unwrap_or("nothing"));
    Ok(resolved.value)
}
