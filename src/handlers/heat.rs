// src/handlers/heat.rs
use anyhow::Result;
use log::info;
use std::path::Path;

use super::error::PipelineError;
use crate::config::load_keywords;
use crate::models::EventHeatRecord;
use crate::services::artifacts::write_json;
use crate::services::heat::score_file;

pub fn run_heat_step(events_csv: &Path, keywords_config: &Path, out: &Path) -> Result<EventHeatRecord> {
    let keywords = load_keywords(keywords_config);
    info!("Scoring trade heat from {} with {} keywords", events_csv.display(), keywords.len());

    let record = score_file(events_csv, &keywords);
    write_json(out, &record).map_err(|e| PipelineError::artifact(out, e))?;
    Ok(record)
}
