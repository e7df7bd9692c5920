// src/config.rs
use log::warn;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::services::numeric::parse_lenient;

/// Snapshot of environment values, taken once at start-up and handed to the
/// components that accept operator overrides.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    vars: HashMap<String, String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Overrides {
            vars: env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Overrides {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Leniently parsed number, `None` when unset or unparseable.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(parse_lenient)
    }

    /// Non-empty string value.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn parsed_or<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key).map(str::trim).filter(|v| !v.is_empty()) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("{} has unparseable value {:?}, using default", key, raw);
                default
            }),
        }
    }

    fn flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("1") | Some("true") | Some("yes") | Some("on")
        )
    }
}

/// Environment keys consulted as final overrides for each metric.
pub mod keys {
    pub const RATE_CUT_ODDS: &str = "RATE_CUT_ODDS";
    pub const VIX_PCTILE: &str = "VIX_PCTILE";
    pub const POLYMARKET_PROB: &str = "POLYMARKET_PROB";
    pub const CORR_SPX_DXY: &str = "CORR_SPX_DXY";
    pub const CORR_SPX_10Y: &str = "CORR_SPX_10Y";
    pub const STANCE: &str = "STANCE";
}

/// Last-resort values used when every other layer abstains.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDefaults {
    pub vix_pctile: Option<f64>,
    pub rate_cut_prob: Option<f64>,
    pub corr_spx_dxy: Option<f64>,
    pub corr_spx_10y: Option<f64>,
}

impl Default for StaticDefaults {
    fn default() -> Self {
        StaticDefaults {
            vix_pctile: Some(0.3),
            rate_cut_prob: Some(0.33),
            corr_spx_dxy: Some(-0.4),
            corr_spx_10y: Some(-0.3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceUrls {
    pub stooq_vix: String,
    pub yahoo_chart_base: String,
    pub market_primary: String,
    pub market_fallback: String,
}

impl Default for SourceUrls {
    fn default() -> Self {
        SourceUrls {
            stooq_vix: "https://stooq.com/q/d/l/?s=%5Evix&i=d".to_string(),
            yahoo_chart_base: "https://query2.finance.yahoo.com/v8/finance/chart".to_string(),
            market_primary: "https://delta.polymarket.com/markets?limit=50".to_string(),
            market_fallback: "https://polymarket.com/api/markets?limit=50".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub out_dir: PathBuf,
    pub prices_dir: PathBuf,
    pub price_cache_dir: PathBuf,
    pub last_good_dir: PathBuf,
    pub events_csv: PathBuf,
    pub keywords_config: PathBuf,
    pub vix_window: usize,
    pub corr_window: usize,
    pub http_timeout: Duration,
    pub offline: bool,
    pub defaults: StaticDefaults,
    pub urls: SourceUrls,
    pub overrides: Overrides,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            out_dir: PathBuf::from("data/macro"),
            prices_dir: PathBuf::from("data/prices"),
            price_cache_dir: PathBuf::from("data/cache"),
            last_good_dir: PathBuf::from("data/cache/last_good"),
            events_csv: PathBuf::from("data/warehouse/events.csv"),
            keywords_config: PathBuf::from("config/macro.toml"),
            vix_window: 252,
            corr_window: 90,
            http_timeout: Duration::from_secs(12),
            offline: false,
            defaults: StaticDefaults::default(),
            urls: SourceUrls::default(),
            overrides: Overrides::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_overrides(overrides: Overrides) -> Self {
        let base = PipelineConfig::default();
        let path = |key: &str, default: PathBuf| {
            overrides.text(key).map(PathBuf::from).unwrap_or(default)
        };
        let default_num = |key: &str, default: Option<f64>| overrides.number(key).or(default);

        let defaults = StaticDefaults {
            vix_pctile: default_num("VIX_PCTILE_DEFAULT", base.defaults.vix_pctile),
            rate_cut_prob: default_num("POLYMARKET_PROB_DEFAULT", base.defaults.rate_cut_prob),
            corr_spx_dxy: default_num("CORR_SPX_DXY_DEFAULT", base.defaults.corr_spx_dxy),
            corr_spx_10y: default_num("CORR_SPX_10Y_DEFAULT", base.defaults.corr_spx_10y),
        };
        let urls = SourceUrls {
            stooq_vix: overrides.text("STOOQ_VIX_URL").unwrap_or(base.urls.stooq_vix),
            yahoo_chart_base: overrides
                .text("YAHOO_CHART_URL")
                .unwrap_or(base.urls.yahoo_chart_base),
            market_primary: overrides
                .text("POLYMARKET_PRIMARY_URL")
                .unwrap_or(base.urls.market_primary),
            market_fallback: overrides
                .text("POLYMARKET_FALLBACK_URL")
                .unwrap_or(base.urls.market_fallback),
        };

        PipelineConfig {
            out_dir: path("MACRO_OUT_DIR", base.out_dir),
            prices_dir: path("PRICES_DIR", base.prices_dir),
            price_cache_dir: path("PRICE_CACHE_DIR", base.price_cache_dir),
            last_good_dir: path("LAST_GOOD_DIR", base.last_good_dir),
            events_csv: path("EVENTS_CSV", base.events_csv),
            keywords_config: path("KEYWORDS_CONFIG", base.keywords_config),
            vix_window: positive(overrides.parsed_or("VIX_WINDOW", base.vix_window), base.vix_window),
            corr_window: positive(overrides.parsed_or("CORR_WINDOW", base.corr_window), base.corr_window),
            http_timeout: Duration::from_secs(overrides.parsed_or("HTTP_TIMEOUT_SECS", 12u64)),
            offline: overrides.flag("OFFLINE"),
            defaults,
            urls,
            overrides,
        }
    }

    pub fn vix_csv(&self) -> PathBuf {
        self.out_dir.join("vix.csv")
    }

    pub fn odds_csv(&self) -> PathBuf {
        self.out_dir.join("polymarket_live.csv")
    }

    pub fn corr_json(&self) -> PathBuf {
        self.out_dir.join("corr.json")
    }

    pub fn heat_json(&self) -> PathBuf {
        self.out_dir.join("trade_conflict.json")
    }

    pub fn metrics_json(&self) -> PathBuf {
        self.out_dir.join("metrics.json")
    }

    // Last-good values only ever hold a value won by a local or remote
    // source, never an override or a static default.

    pub fn last_good_vix(&self) -> PathBuf {
        self.last_good_dir.join("vix_pctile.csv")
    }

    pub fn last_good_odds(&self) -> PathBuf {
        self.last_good_dir.join("rate_cut_prob.csv")
    }

    pub fn last_good_corr(&self) -> PathBuf {
        self.last_good_dir.join("corr.json")
    }
}

fn positive(value: usize, default: usize) -> usize {
    if value == 0 {
        warn!("window size must be positive, using {}", default);
        default
    } else {
        value
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeywordFile {
    #[serde(default)]
    trade_keywords: Vec<String>,
}

/// Reads the `trade_keywords` list from a TOML file, lowercased.
/// A missing or malformed file yields an empty list.
pub fn load_keywords(path: &Path) -> Vec<String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("keyword config {} unavailable: {}", path.display(), e);
            return Vec::new();
        }
    };
    match toml::from_str::<KeywordFile>(&text) {
        Ok(file) => file
            .trade_keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect(),
        Err(e) => {
            warn!("keyword config {} is malformed: {}", path.display(), e);
            Vec::new()
        }
    }
}
