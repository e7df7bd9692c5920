// src/services/cross_asset.rs
use log::{info, warn};
use reqwest::Client;
use std::path::Path;

use crate::config::{keys, PipelineConfig};
use crate::models::{CorrelationRecord, TimeSeries};
use crate::services::artifacts::{read_json, write_json};
use crate::services::cascade::{Cascade, Resolved, SourceLayer};
use crate::services::correlation::rolling_correlation;
use crate::services::prices::{fetch_yahoo_chart, history_range, load_local_csv, write_series_csv};
use crate::BoxError;

/// Where one price series can come from.
#[derive(Debug, Clone)]
pub struct PriceSource {
    pub name: &'static str,
    pub file: &'static str,
    pub primary: &'static str,
    pub fallback: Option<&'static str>,
}

pub const SPX: PriceSource = PriceSource {
    name: "SPX",
    file: "spx.csv",
    primary: "^GSPC",
    fallback: None,
};

pub const DXY: PriceSource = PriceSource {
    name: "DXY",
    file: "dxy.csv",
    primary: "DX-Y.NYB",
    fallback: Some("DX=F"),
};

pub const TNX: PriceSource = PriceSource {
    name: "TNX",
    file: "tnx.csv",
    primary: "^TNX",
    fallback: None,
};

/// Local CSV, primary ticker, fallback ticker, then the series cached by
/// the last successful remote fetch. Nothing is written here; see
/// [`CrossAssetRun::refresh_caches`].
pub async fn resolve_series(cfg: &PipelineConfig, client: &Client, source: &PriceSource) -> Resolved<TimeSeries> {
    let local_path = cfg.prices_dir.join(source.file);
    let cached = cfg.price_cache_dir.join(source.file);
    let base = cfg.urls.yahoo_chart_base.as_str();
    // returns need one extra session
    let range = history_range(cfg.corr_window + 1);

    let mut cascade = Cascade::new(source.name)
        .offline(cfg.offline)
        .attempt(format!("local {}", source.file), SourceLayer::Local, move || async move {
            load_local_csv(&local_path)
        })
        .attempt(format!("yahoo {}", source.primary), SourceLayer::PrimaryRemote, move || async move {
            Ok::<_, BoxError>(Some(fetch_yahoo_chart(client, base, source.primary, range).await?))
        });
    if let Some(fallback) = source.fallback {
        cascade = cascade.attempt(format!("yahoo {}", fallback), SourceLayer::FallbackRemote, move || async move {
            Ok::<_, BoxError>(Some(fetch_yahoo_chart(client, base, fallback, range).await?))
        });
    }
    cascade
        .attempt("cached series", SourceLayer::LastKnown, move || async move {
            load_local_csv(&cached)
        })
        .resolve()
        .await
}

fn previous_value(path: &Path, key: &str) -> Result<Option<f64>, BoxError> {
    if !path.exists() {
        return Ok(None);
    }
    let previous: CorrelationRecord = read_json(path)?;
    Ok(match key {
        "spx_dxy" => previous.spx_dxy,
        "spx_10y" => previous.spx_10y,
        _ => None,
    })
}

/// Correlation of two resolved series. It counts as fetched only when both
/// series were; a value computed from the series cache is last-known data.
fn computed_pair(cfg: &PipelineConfig, a: &Resolved<TimeSeries>, b: &Resolved<TimeSeries>) -> (Option<f64>, SourceLayer) {
    let value = match (&a.value, &b.value) {
        (Some(a), Some(b)) => rolling_correlation(a, b, cfg.corr_window),
        _ => None,
    };
    let fetched = [a.layer, b.layer]
        .into_iter()
        .all(|layer| layer.map_or(false, SourceLayer::is_fetched));
    let layer = if fetched { SourceLayer::Local } else { SourceLayer::LastKnown };
    (value, layer)
}

/// Computed value, last good value, environment override, static default.
async fn resolve_pair(
    cfg: &PipelineConfig,
    key: &'static str,
    env_key: &'static str,
    computed: (Option<f64>, SourceLayer),
    default: Option<f64>,
) -> Resolved<f64> {
    let last_good = cfg.last_good_corr();
    let (value, layer) = computed;
    Cascade::new(format!("corr {}", key))
        .constant("price series", layer, value)
        .attempt("last good corr", SourceLayer::LastKnown, move || async move {
            previous_value(&last_good, key)
        })
        .constant(env_key, SourceLayer::Override, cfg.overrides.number(env_key))
        .constant("static default", SourceLayer::StaticDefault, default)
        .resolve()
        .await
}

pub struct CrossAssetRun {
    pub series: Vec<(PriceSource, Resolved<TimeSeries>)>,
    pub spx_dxy: Resolved<f64>,
    pub spx_10y: Resolved<f64>,
}

impl CrossAssetRun {
    pub fn record(&self) -> CorrelationRecord {
        CorrelationRecord {
            spx_dxy: self.spx_dxy.value,
            spx_10y: self.spx_10y.value,
        }
    }

    /// Stores remotely fetched series in the series cache and fetched pair
    /// values in the last-good file. Overrides and defaults are never stored.
    pub fn refresh_caches(&self, cfg: &PipelineConfig) -> Result<(), BoxError> {
        for (source, resolved) in &self.series {
            if let (Some(series), Some(layer)) = (&resolved.value, resolved.layer) {
                if layer.requires_network() {
                    write_series_csv(&cfg.price_cache_dir.join(source.file), series)?;
                }
            }
        }

        let dxy = self.spx_dxy.fetched().copied();
        let tnx = self.spx_10y.fetched().copied();
        if dxy.is_none() && tnx.is_none() {
            return Ok(());
        }
        let path = cfg.last_good_corr();
        let mut last_good: CorrelationRecord = if path.exists() {
            read_json(&path).unwrap_or_else(|e| {
                warn!("[corr] replacing unreadable {}: {}", path.display(), e);
                CorrelationRecord::default()
            })
        } else {
            CorrelationRecord::default()
        };
        last_good.spx_dxy = dxy.or(last_good.spx_dxy);
        last_good.spx_10y = tnx.or(last_good.spx_10y);
        write_json(&path, &last_good)
    }
}

pub async fn resolve_correlations(cfg: &PipelineConfig, client: &Client) -> CrossAssetRun {
    let spx = resolve_series(cfg, client, &SPX).await;
    let dxy = resolve_series(cfg, client, &DXY).await;
    let tnx = resolve_series(cfg, client, &TNX).await;

    let corr_dxy = computed_pair(cfg, &spx, &dxy);
    let corr_10y = computed_pair(cfg, &spx, &tnx);
    info!(
        "[corr] computed spx_dxy={:?} spx_10y={:?} (window {})",
        corr_dxy.0, corr_10y.0, cfg.corr_window
    );

    let spx_dxy = resolve_pair(cfg, "spx_dxy", keys::CORR_SPX_DXY, corr_dxy, cfg.defaults.corr_spx_dxy).await;
    let spx_10y = resolve_pair(cfg, "spx_10y", keys::CORR_SPX_10Y, corr_10y, cfg.defaults.corr_spx_10y).await;

    CrossAssetRun {
        series: vec![(SPX, spx), (DXY, dxy), (TNX, tnx)],
        spx_dxy,
        spx_10y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use crate::services::http::build_client;
    use chrono::{Duration, NaiveDate};
    use std::fmt::Write as _;
    use std::fs;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    fn price_csv(values: impl Iterator<Item = f64>) -> String {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut out = String::from("Date,Close\n");
        for (i, v) in values.enumerate() {
            writeln!(out, "{},{}", start + Duration::days(i as i64), v).unwrap();
        }
        out
    }

    fn config(dir: &TempDir, overrides: Overrides) -> PipelineConfig {
        let mut cfg = PipelineConfig::from_overrides(overrides);
        cfg.out_dir = dir.path().join("macro");
        cfg.prices_dir = dir.path().join("prices");
        cfg.price_cache_dir = dir.path().join("cache");
        cfg.last_good_dir = dir.path().join("last_good");
        cfg.corr_window = 10;
        cfg.offline = true;
        cfg
    }

    fn write_local_pair(cfg: &PipelineConfig) {
        fs::create_dir_all(&cfg.prices_dir).unwrap();
        let spx: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64).sin() * 3.0).collect();
        fs::write(cfg.prices_dir.join("spx.csv"), price_csv(spx.iter().copied())).unwrap();
        fs::write(cfg.prices_dir.join("dxy.csv"), price_csv(spx.iter().map(|v| v * 2.0))).unwrap();
    }

    #[tokio::test]
    async fn computes_from_local_series() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Overrides::default());
        write_local_pair(&cfg);

        let client = build_client(StdDuration::from_secs(1)).unwrap();
        let run = resolve_correlations(&cfg, &client).await;
        assert_eq!(run.spx_dxy.layer, Some(SourceLayer::Local));
        assert_eq!(run.record().spx_dxy, Some(1.0));
        // no tnx series anywhere
        assert_eq!(run.spx_10y.layer, Some(SourceLayer::StaticDefault));
        assert_eq!(run.record().spx_10y, Some(-0.3));
    }

    #[tokio::test]
    async fn falls_back_to_last_good_then_env() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Overrides::from_pairs([("CORR_SPX_DXY", "-0.15"), ("CORR_SPX_10Y", "0.2")]));
        write_json(
            &cfg.last_good_corr(),
            &serde_json::json!({"spx_dxy": -0.52, "spx_10y": null}),
        )
        .unwrap();
        // the published artifact is not consulted
        write_json(&cfg.corr_json(), &serde_json::json!({"spx_dxy": -0.4, "spx_10y": -0.3})).unwrap();

        let client = build_client(StdDuration::from_secs(1)).unwrap();
        let record = resolve_correlations(&cfg, &client).await.record();
        assert_eq!(record.spx_dxy, Some(-0.52));
        assert_eq!(record.spx_10y, Some(0.2));
    }

    #[tokio::test]
    async fn only_fetched_pairs_refresh_the_last_good_file() {
        let dir = TempDir::new().unwrap();
        let client = build_client(StdDuration::from_secs(1)).unwrap();

        let cfg = config(&dir, Overrides::default());
        let run = resolve_correlations(&cfg, &client).await;
        run.refresh_caches(&cfg).unwrap();
        assert!(!cfg.last_good_corr().exists());

        write_local_pair(&cfg);
        let run = resolve_correlations(&cfg, &client).await;
        run.refresh_caches(&cfg).unwrap();
        let stored: CorrelationRecord = read_json(&cfg.last_good_corr()).unwrap();
        assert_eq!(stored, CorrelationRecord { spx_dxy: Some(1.0), spx_10y: None });
        // local series are never copied into the series cache
        assert!(!cfg.price_cache_dir.join("spx.csv").exists());
    }

    #[tokio::test]
    async fn pair_from_cached_series_is_not_fetched() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Overrides::default());
        write_local_pair(&cfg);
        fs::rename(cfg.prices_dir.join("dxy.csv"), dir.path().join("dxy.csv")).unwrap();
        fs::create_dir_all(&cfg.price_cache_dir).unwrap();
        fs::rename(dir.path().join("dxy.csv"), cfg.price_cache_dir.join("dxy.csv")).unwrap();

        let client = build_client(StdDuration::from_secs(1)).unwrap();
        let run = resolve_correlations(&cfg, &client).await;
        assert_eq!(run.spx_dxy.value, Some(1.0));
        assert_eq!(run.spx_dxy.layer, Some(SourceLayer::LastKnown));
        assert_eq!(run.spx_dxy.fetched(), None);
    }

    #[tokio::test]
    async fn remote_series_is_cached_by_refresh_only() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Overrides::default());
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let series = TimeSeries::from_points([(day, Some(101.5))]);

        let remote = Cascade::new("SPX")
            .constant("yahoo ^GSPC", SourceLayer::PrimaryRemote, Some(series))
            .resolve()
            .await;
        let pair = || Resolved {
            value: None,
            label: None,
            layer: None,
            trail: Vec::new(),
        };
        let run = CrossAssetRun {
            series: vec![(SPX, remote)],
            spx_dxy: pair(),
            spx_10y: pair(),
        };
        assert!(!cfg.price_cache_dir.join("spx.csv").exists());

        run.refresh_caches(&cfg).unwrap();
        let cached = load_local_csv(&cfg.price_cache_dir.join("spx.csv")).unwrap().unwrap();
        assert_eq!(cached.value_on(day), Some(101.5));
        assert!(!cfg.last_good_corr().exists());
    }

    #[tokio::test]
    async fn cached_series_is_used_when_nothing_local() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, Overrides::default());
        fs::create_dir_all(&cfg.price_cache_dir).unwrap();
        fs::write(cfg.price_cache_dir.join("tnx.csv"), price_csv((0..5).map(f64::from))).unwrap();

        let client = build_client(StdDuration::from_secs(1)).unwrap();
        let resolved = resolve_series(&cfg, &client, &TNX).await;
        assert_eq!(resolved.layer, Some(SourceLayer::LastKnown));
        assert_eq!(resolved.value.unwrap().len(), 5);
        assert!(resolve_series(&cfg, &client, &SPX).await.value.is_none());
    }
}
