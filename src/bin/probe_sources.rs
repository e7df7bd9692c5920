use dotenv::dotenv;
use log::info;

use macro_pulse::config::{Overrides, PipelineConfig};
use macro_pulse::models::TimeSeries;
use macro_pulse::services::cascade::{AttemptOutcome, Resolved};
use macro_pulse::services::cross_asset::{resolve_series, DXY, SPX, TNX};
use macro_pulse::services::http::build_client;
use macro_pulse::services::odds::resolve_rate_cut_prob;
use macro_pulse::services::vix::resolve_vix_pctile;

fn print_trail<T>(name: &str, resolved: &Resolved<T>, show: impl Fn(&T) -> String) {
    let value = resolved.value.as_ref().map(show).unwrap_or_else(|| "none".to_string());
    println!("{}: {} via {}", name, value, resolved.label.as_deref().unwrap_or("nothing"));
    for step in &resolved.trail {
        let outcome = match &step.outcome {
            AttemptOutcome::Won => "won".to_string(),
            AttemptOutcome::Empty => "empty".to_string(),
            AttemptOutcome::Abstained(reason) => format!("abstained ({})", reason),
            AttemptOutcome::Skipped => "skipped".to_string(),
        };
        println!("    {:<24} {:<16} {}", step.label, step.layer.as_str(), outcome);
    }
}

fn describe_series(series: &TimeSeries) -> String {
    match series.last() {
        Some(last) => format!("{} points, last {} = {}", series.len(), last.date, last.value),
        None => "0 points".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let cfg = PipelineConfig::from_overrides(Overrides::from_env());
    info!("Probing sources (offline: {}), nothing is written", cfg.offline);
    let client = build_client(cfg.http_timeout)?;

    print_trail("vix_pctile", &resolve_vix_pctile(&cfg, &client).await, |v| v.to_string());
    print_trail("rate_cut_prob", &resolve_rate_cut_prob(&cfg, &client).await, |v| v.to_string());
    for source in [&SPX, &DXY, &TNX] {
        print_trail(source.name, &resolve_series(&cfg, &client, source).await, describe_series);
    }
    Ok(())
}
