// src/handlers/report.rs
use anyhow::Result;
use chrono::NaiveDate;
use log::{info, warn};
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::error::PipelineError;
use crate::services::artifacts::read_json;
use crate::services::report::{
    markdown_to_html, missing_keys, render_markdown, resolve_arch_asset, wrap_html, write_report, ReportPaths,
};

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub metrics: PathBuf,
    pub events: PathBuf,
    pub outdir: PathBuf,
    pub title: String,
    pub allow_na: bool,
    pub as_of: NaiveDate,
    /// Where to look for `report_assets/architecture.*`.
    pub asset_root: PathBuf,
}

pub fn render_report(opts: &RenderOptions) -> Result<ReportPaths> {
    let metrics: Map<String, Value> =
        read_json(&opts.metrics).map_err(|e| PipelineError::artifact(&opts.metrics, e))?;

    let missing = missing_keys(&metrics);
    if !missing.is_empty() {
        let missing: Vec<String> = missing.into_iter().map(str::to_string).collect();
        if !opts.allow_na {
            return Err(PipelineError::MissingKeys(missing).into());
        }
        warn!("[render] missing keys rendered as N/A: {}", missing.join(", "));
    }

    let heat: Map<String, Value> = if opts.events.exists() {
        read_json(&opts.events).unwrap_or_else(|e| {
            warn!("[render] ignoring unreadable {}: {}", opts.events.display(), e);
            Map::new()
        })
    } else {
        Map::new()
    };

    let arch = resolve_arch_asset(&opts.asset_root, &opts.outdir).unwrap_or_else(|e| {
        warn!("[render] skipping architecture diagram: {}", e);
        None
    });
    let md = render_markdown(&opts.title, opts.as_of, &metrics, &heat, arch.as_deref());
    let body = markdown_to_html(&md).map_err(|e| anyhow::anyhow!(e))?;
    let html = wrap_html(&opts.title, &body);

    let paths = write_report(&opts.outdir, opts.as_of, &md, &html)
        .map_err(|e| PipelineError::artifact(&opts.outdir, e))?;
    info!("[render] OK -> {}", paths.html.display());
    Ok(paths)
}
