// src/services/odds.rs
use log::debug;
use reqwest::Client;
use serde_json::Value;

use crate::config::{keys, PipelineConfig};
use crate::services::artifacts::last_known_value;
use crate::services::cascade::{Cascade, Resolved, SourceLayer};
use crate::services::http::fetch_json;
use crate::services::numeric::{round_to, value_to_f64};
use crate::BoxError;

const RATE_TERMS: [&str; 4] = ["cut", "decrease", "lower", "rate"];

/// Sum of positive outcome prices for one market, capped at 1.0.
fn market_prob(market: &Value) -> Option<f64> {
    let outcomes = market.get("outcomes")?.as_array()?;
    let prices: Vec<f64> = outcomes
        .iter()
        .filter_map(|o| o.get("price").and_then(value_to_f64))
        .filter(|p| *p > 0.0)
        .collect();
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>().min(1.0))
}

/// Mean probability across rate-related markets, rounded to 4 decimals.
pub fn extract_prob(markets: &[Value]) -> Option<f64> {
    let probs: Vec<f64> = markets
        .iter()
        .filter(|m| {
            let title = m
                .get("question")
                .and_then(Value::as_str)
                .or_else(|| m.get("title").and_then(Value::as_str))
                .unwrap_or("")
                .to_lowercase();
            RATE_TERMS.iter().any(|t| title.contains(t))
        })
        .filter_map(market_prob)
        .collect();

    if probs.is_empty() {
        return None;
    }
    Some(round_to(probs.iter().sum::<f64>() / probs.len() as f64, 4))
}

/// Accepts `{"markets": [...]}` or a bare array.
pub fn markets_from_payload(payload: &Value) -> Result<&[Value], BoxError> {
    let list = payload.get("markets").unwrap_or(payload);
    list.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| "market payload is not a list".into())
}

pub async fn fetch_market_prob(client: &Client, url: &str) -> Result<Option<f64>, BoxError> {
    let payload = fetch_json(client, url).await?;
    let markets = markets_from_payload(&payload)?;
    debug!("{} markets from {}", markets.len(), url);
    Ok(extract_prob(markets))
}

/// Rate-cut probability: primary market feed, fallback feed, last good
/// fetched value, `POLYMARKET_PROB`, static default.
pub async fn resolve_rate_cut_prob(cfg: &PipelineConfig, client: &Client) -> Resolved<f64> {
    let last_good_path = cfg.last_good_odds();

    Cascade::new("odds")
        .offline(cfg.offline)
        .attempt("primary market feed", SourceLayer::PrimaryRemote, move || {
            fetch_market_prob(client, &cfg.urls.market_primary)
        })
        .attempt("fallback market feed", SourceLayer::FallbackRemote, move || {
            fetch_market_prob(client, &cfg.urls.market_fallback)
        })
        .attempt("last good odds", SourceLayer::LastKnown, move || async move {
            last_known_value(&last_good_path, "prob")
        })
        .constant(keys::POLYMARKET_PROB, SourceLayer::Override, cfg.overrides.number(keys::POLYMARKET_PROB))
        .constant("static default", SourceLayer::StaticDefault, cfg.defaults.rate_cut_prob)
        .resolve()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use crate::services::artifacts::write_single_value_csv;
    use crate::services::http::build_client;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn averages_rate_markets_only() {
        let markets = vec![
            json!({"question": "Will the Fed cut rates in June?", "outcomes": [{"price": "0.6"}, {"price": 0}]}),
            json!({"title": "Rate hike by July", "outcomes": [{"price": 0.2}, {"price": 0.1}]}),
            json!({"question": "Who wins the election?", "outcomes": [{"price": 0.9}]}),
            json!({"question": "Lower rates?", "outcomes": []}),
        ];
        assert_eq!(extract_prob(&markets), Some(0.45));
    }

    #[test]
    fn market_prob_is_capped() {
        let markets = vec![json!({"question": "rate cut", "outcomes": [{"price": 0.8}, {"price": 0.7}]})];
        assert_eq!(extract_prob(&markets), Some(1.0));
    }

    #[test]
    fn no_matching_markets() {
        assert_eq!(extract_prob(&[json!({"question": "weather"})]), None);
        assert_eq!(extract_prob(&[]), None);
    }

    #[test]
    fn payload_shapes() {
        let wrapped = json!({"markets": [{"question": "a"}]});
        assert_eq!(markets_from_payload(&wrapped).unwrap().len(), 1);
        let bare = json!([{"question": "a"}, {"question": "b"}]);
        assert_eq!(markets_from_payload(&bare).unwrap().len(), 2);
        assert!(markets_from_payload(&json!({"data": 1})).is_err());
    }

    #[tokio::test]
    async fn offline_falls_back_to_last_good_then_env() {
        let dir = TempDir::new().unwrap();
        let mut cfg = PipelineConfig::from_overrides(Overrides::from_pairs([("POLYMARKET_PROB", "0.61")]));
        cfg.out_dir = dir.path().join("macro");
        cfg.last_good_dir = dir.path().join("last_good");
        cfg.offline = true;
        let client = build_client(Duration::from_secs(1)).unwrap();

        // the published artifact of an earlier run is not a fetched value
        write_single_value_csv(&cfg.odds_csv(), "prob", Some(0.33)).unwrap();
        let resolved = resolve_rate_cut_prob(&cfg, &client).await;
        assert_eq!(resolved.into_parts(), (Some(0.61), Some(keys::POLYMARKET_PROB.to_string())));

        write_single_value_csv(&cfg.last_good_odds(), "prob", Some(0.27)).unwrap();
        let resolved = resolve_rate_cut_prob(&cfg, &client).await;
        assert_eq!(resolved.layer, Some(SourceLayer::LastKnown));
        assert_eq!(resolved.value, Some(0.27));
    }
}
