// src/cli.rs
use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::config::{Overrides, PipelineConfig};
use crate::handlers::correlation::run_correlation_step;
use crate::handlers::heat::run_heat_step;
use crate::handlers::metrics::emit_metrics;
use crate::handlers::odds::run_odds_step;
use crate::handlers::pipeline::{run_pipeline, RunOptions};
use crate::handlers::report::{render_report, RenderOptions};
use crate::handlers::vix::run_vix_step;
use crate::services::adapter::{CsvAgg, FieldSource, MetricSources};
use crate::services::http::build_client;

const DEFAULT_TITLE: &str = "Weekly Macro Snapshot";

#[derive(Parser)]
#[command(name = "macro_pulse", about = "Macro indicator pipeline with layered source fallback")]
pub struct Cli {
    /// Skip every network source.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    /// Directory for per-metric artifacts. Defaults to $MACRO_OUT_DIR or data/macro.
    #[arg(long, global = true)]
    pub out_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the VIX percentile and write vix.csv.
    Vix,
    /// Resolve the rate-cut probability and write polymarket_live.csv.
    Odds,
    /// Resolve SPX/DXY and SPX/10Y correlations and write corr.json.
    Corr,
    /// Score trade-conflict event heat and write trade_conflict.json.
    Heat {
        /// Events CSV (publish_time, title, summary).
        #[arg(long)]
        events: Option<PathBuf>,

        /// TOML file with a `trade_keywords` list.
        #[arg(long)]
        keywords: Option<PathBuf>,
    },
    /// Merge artifacts and environment values into the canonical metrics record.
    EmitMetrics {
        /// Output path. Defaults to <out-dir>/metrics.json.
        #[arg(long)]
        out: Option<PathBuf>,

        /// JSON/CSV file with the rate-cut odds.
        #[arg(long)]
        rate_cut: Option<PathBuf>,
        #[arg(long, default_value = "prob")]
        rate_cut_key: String,

        /// JSON/CSV file with the VIX percentile.
        #[arg(long)]
        vix: Option<PathBuf>,
        #[arg(long, default_value = "pctile")]
        vix_key: String,

        /// JSON/CSV file with the correlations.
        #[arg(long)]
        corr: Option<PathBuf>,
        #[arg(long, default_value = "spx_dxy")]
        corr_dxy_key: String,
        #[arg(long, default_value = "spx_10y")]
        corr_10y_key: String,

        /// Prefer environment values over file values.
        #[arg(long, default_value_t = false)]
        from_env: bool,

        /// CSV aggregation: last or mean.
        #[arg(long, default_value = "last")]
        csv_agg: CsvAgg,
    },
    /// Render the Markdown and HTML report from the metrics record.
    Render {
        /// Defaults to <out-dir>/metrics.json.
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Defaults to <out-dir>/trade_conflict.json.
        #[arg(long)]
        events: Option<PathBuf>,

        #[arg(long, default_value = "report_out")]
        outdir: PathBuf,

        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        /// Render missing keys as N/A instead of failing.
        #[arg(long, default_value_t = false)]
        allow_na: bool,

        /// Report date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Directory searched for `report_assets/architecture.*`.
        #[arg(long, default_value = ".")]
        asset_root: PathBuf,
    },
    /// Run every step, then emit metrics and render the report.
    Run {
        #[arg(long, default_value = "report_out")]
        outdir: PathBuf,

        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        #[arg(long, default_value_t = false)]
        allow_na: bool,

        #[arg(long)]
        as_of: Option<NaiveDate>,

        #[arg(long, default_value = ".")]
        asset_root: PathBuf,
    },
}

impl Cli {
    pub fn config(&self, overrides: Overrides) -> PipelineConfig {
        let mut cfg = PipelineConfig::from_overrides(overrides);
        if let Some(dir) = &self.out_dir {
            cfg.out_dir = dir.clone();
        }
        cfg.offline = cfg.offline || self.offline;
        cfg
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn dispatch(cli: Cli, overrides: Overrides) -> Result<()> {
    let cfg = cli.config(overrides);

    match cli.command {
        Commands::Vix => {
            let client = build_client(cfg.http_timeout).map_err(|e| anyhow::anyhow!(e))?;
            run_vix_step(&cfg, &client).await?;
        }
        Commands::Odds => {
            let client = build_client(cfg.http_timeout).map_err(|e| anyhow::anyhow!(e))?;
            run_odds_step(&cfg, &client).await?;
        }
        Commands::Corr => {
            let client = build_client(cfg.http_timeout).map_err(|e| anyhow::anyhow!(e))?;
            run_correlation_step(&cfg, &client).await?;
        }
        Commands::Heat { events, keywords } => {
            let events = events.unwrap_or_else(|| cfg.events_csv.clone());
            let keywords = keywords.unwrap_or_else(|| cfg.keywords_config.clone());
            run_heat_step(&events, &keywords, &cfg.heat_json())?;
        }
        Commands::EmitMetrics {
            out,
            rate_cut,
            rate_cut_key,
            vix,
            vix_key,
            corr,
            corr_dxy_key,
            corr_10y_key,
            from_env,
            csv_agg,
        } => {
            let sources = MetricSources {
                rate_cut: FieldSource::new(rate_cut, rate_cut_key),
                vix: FieldSource::new(vix, vix_key),
                corr_dxy: FieldSource::new(corr.clone(), corr_dxy_key),
                corr_10y: FieldSource::new(corr, corr_10y_key),
            };
            let out = out.unwrap_or_else(|| cfg.metrics_json());
            let record = emit_metrics(cfg.overrides.clone(), &sources, from_env, csv_agg, &out).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Render {
            metrics,
            events,
            outdir,
            title,
            allow_na,
            as_of,
            asset_root,
        } => {
            let paths = render_report(&RenderOptions {
                metrics: metrics.unwrap_or_else(|| cfg.metrics_json()),
                events: events.unwrap_or_else(|| cfg.heat_json()),
                outdir,
                title,
                allow_na,
                as_of: as_of.unwrap_or_else(today),
                asset_root,
            })?;
            info!("Report written to {}", paths.html.display());
        }
        Commands::Run {
            outdir,
            title,
            allow_na,
            as_of,
            asset_root,
        } => {
            let summary = run_pipeline(
                &cfg,
                &RunOptions {
                    report_dir: outdir,
                    title,
                    allow_na,
                    as_of: as_of.unwrap_or_else(today),
                    asset_root,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&summary.metrics)?);
            info!("Report written to {}", summary.report.html.display());
        }
    }
    Ok(())
}
