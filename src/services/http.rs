// src/services/http.rs
use crate::BoxError;
use log::info;
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// One client per run; the timeout bounds every remote attempt.
pub fn build_client(timeout: Duration) -> Result<Client, BoxError> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

pub async fn fetch_text(client: &Client, url: &str) -> Result<String, BoxError> {
    info!("Fetching {}", url);
    let body = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(body)
}

pub async fn fetch_json(client: &Client, url: &str) -> Result<serde_json::Value, BoxError> {
    let body = fetch_text(client, url).await?;
    Ok(serde_json::from_str(&body)?)
}
