// src/handlers/odds.rs
use anyhow::Result;
use log::{info, warn};
use reqwest::Client;

use super::error::PipelineError;
use crate::config::PipelineConfig;
use crate::services::artifacts::write_single_value_csv;
use crate::services::cascade::AttemptOutcome;
use crate::services::odds::resolve_rate_cut_prob;

pub async fn run_odds_step(cfg: &PipelineConfig, client: &Client) -> Result<Option<f64>> {
    info!("Resolving rate-cut probability");
    let resolved = resolve_rate_cut_prob(cfg, client).await;

    for step in &resolved.trail {
        if let AttemptOutcome::Abstained(reason) = &step.outcome {
            warn!("[odds] fallback note: {}: {}", step.label, reason);
        }
    }

    let path = cfg.odds_csv();
    write_single_value_csv(&path, "prob", resolved.value)
        .map_err(|e| PipelineError::artifact(&path, e))?;
    if let Some(fetched) = resolved.fetched() {
        let last_good = cfg.last_good_odds();
        write_single_value_csv(&last_good, "prob", Some(*fetched))
            .map_err(|e| PipelineError::artifact(&last_good, e))?;
    }
    info!("[odds] {:?} via {}", resolved.value, resolved.label.as_deref().unwrap_or("nothing"));
    Ok(resolved.value)
}
