//! Historical candle retrieval

use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::candle::{Candle, CandleRow};

/// Client for the instrument candles endpoint
pub struct HistoryClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<CandleRow>,
}

impl HistoryClient {
    pub fn new(base_url: &str, token: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Fetch the most recent `count` complete candles, oldest first
    pub async fn fetch_candles(
        &self,
        instrument: &str,
        granularity: &str,
        count: usize,
    ) -> anyhow::Result<Vec<Candle>> {
        let url = format!(
            "{}/v3/instruments/{}/candles?granularity={}&count={}&price=M",
            self.base_url, instrument, granularity, count
        );

        debug!("Fetching {} candles for {} from {}", count, instrument, url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Candle request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Candle fetch failed: {} - {}", status, text);
        }

        let body: CandlesResponse = response
            .json()
            .await
            .context("Failed to parse candles response")?;

        let candles = body
            .candles
            .into_iter()
            .filter(|row| row.complete)
            .map(CandleRow::into_candle)
            .collect::<anyhow::Result<Vec<_>>>()?;

        info!(
            "Fetched {} complete {} candles for {}",
            candles.len(),
            granularity,
            instrument
        );
        Ok(candles)
    }

    /// Fetch the most recent complete candle
    pub async fn latest_candle(
        &self,
        instrument: &str,
        granularity: &str,
    ) -> anyhow::Result<Candle> {
        // Request two rows: the newest may still be forming
        let candles = self.fetch_candles(instrument, granularity, 2).await?;
        candles
            .into_iter()
            .last()
            .context("No complete candle returned")
    }
}
