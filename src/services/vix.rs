// src/services/vix.rs
use reqwest::Client;

use crate::config::{keys, PipelineConfig};
use crate::models::TimeSeries;
use crate::services::artifacts::last_known_value;
use crate::services::cascade::{Cascade, Resolved, SourceLayer};
use crate::services::percentile::percentile_rank;
use crate::services::prices::{fetch_stooq_csv, fetch_yahoo_chart, history_range, load_local_csv};
use crate::BoxError;

pub const VIX_SYMBOL: &str = "^VIX";

fn trailing_pctile(series: &TimeSeries, window: usize) -> Option<f64> {
    percentile_rank(&series.tail(window).values(), window)
}

/// Percentile of the latest VIX close within the trailing window:
/// local CSV, Stooq, Yahoo, last good value, `VIX_PCTILE`, static default.
pub async fn resolve_vix_pctile(cfg: &PipelineConfig, client: &Client) -> Resolved<f64> {
    let window = cfg.vix_window;
    let local_path = cfg.prices_dir.join("vix.csv");
    let last_good_path = cfg.last_good_vix();
    let range = history_range(window);

    Cascade::new("vix")
        .offline(cfg.offline)
        .attempt("local vix.csv", SourceLayer::Local, move || async move {
            Ok::<_, BoxError>(load_local_csv(&local_path)?.and_then(|s| trailing_pctile(&s, window)))
        })
        .attempt("stooq", SourceLayer::PrimaryRemote, move || async move {
            let series = fetch_stooq_csv(client, &cfg.urls.stooq_vix).await?;
            Ok::<_, BoxError>(trailing_pctile(&series, window))
        })
        .attempt("yahoo", SourceLayer::FallbackRemote, move || async move {
            let series = fetch_yahoo_chart(client, &cfg.urls.yahoo_chart_base, VIX_SYMBOL, range).await?;
            Ok::<_, BoxError>(trailing_pctile(&series, window))
        })
        .attempt("last good vix", SourceLayer::LastKnown, move || async move {
            last_known_value(&last_good_path, "pctile")
        })
        .constant(keys::VIX_PCTILE, SourceLayer::Override, cfg.overrides.number(keys::VIX_PCTILE))
        .constant("static default", SourceLayer::StaticDefault, cfg.defaults.vix_pctile)
        .resolve()
        .await
}
