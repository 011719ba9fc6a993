//! Entry point: load settings, train one agent per instrument, then run
//! the live pipelines concurrently.

use anyhow::Context;
use tracing::info;

use fx_runner::agent::{AgentConfig, QLearningAgent};
use fx_runner::broker::BrokerClient;
use fx_runner::config::Settings;
use fx_runner::history::HistoryClient;
use fx_runner::indicators;
use fx_runner::stream::LivePipeline;

const DEFAULT_SETTINGS_PATH: &str = "cfg/parameters.yaml";
const DEFAULT_INSTRUMENTS: [&str; 2] = ["EUR_USD", "GBP_USD"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting the pipeline...");

    let settings = Settings::load(DEFAULT_SETTINGS_PATH)?;
    let token = std::env::var("FX_API_TOKEN").context("FX_API_TOKEN environment variable required")?;
    let account_id =
        std::env::var("FX_ACCOUNT_ID").context("FX_ACCOUNT_ID environment variable required")?;

    let instruments = select_instruments(&settings)?;
    info!("Selected currency pairs: {}", instruments.join(", "));

    let mut workers = Vec::new();
    for instrument in instruments {
        let pipeline = build_pipeline(&settings, &token, &account_id, &instrument).await?;
        workers.push(tokio::spawn(pipeline.run()));
    }

    for worker in workers {
        worker.await.context("Worker panicked")??;
    }
    Ok(())
}

/// Instruments from argv, falling back to the defaults. Every pair must
/// be configured and duplicates are rejected.
fn select_instruments(settings: &Settings) -> anyhow::Result<Vec<String>> {
    let mut instruments: Vec<String> = std::env::args().skip(1).collect();
    if instruments.is_empty() {
        instruments = DEFAULT_INSTRUMENTS.iter().map(|s| s.to_string()).collect();
    }

    for (i, instrument) in instruments.iter().enumerate() {
        settings.instrument(instrument)?;
        if instruments[..i].contains(instrument) {
            anyhow::bail!("Duplicate pairs are not allowed: {}", instrument);
        }
    }
    Ok(instruments)
}

/// Fetch history, enrich it, batch-train a fresh agent and assemble the
/// live pipeline for one instrument.
async fn build_pipeline(
    settings: &Settings,
    token: &str,
    account_id: &str,
    instrument: &str,
) -> anyhow::Result<LivePipeline> {
    let history = HistoryClient::new(&settings.api.base_url, token)?;
    let broker = BrokerClient::new(
        &settings.api.base_url,
        token,
        account_id,
        settings.trading_mode,
    )?;

    let candles = history
        .fetch_candles(
            instrument,
            &settings.candlestick.granularity,
            settings.candlestick.count,
        )
        .await
        .with_context(|| format!("Failed to fetch history for {}", instrument))?;

    let bars = indicators::enrich(&candles);
    if bars.len() < 2 {
        anyhow::bail!(
            "Not enough history for {} after indicator warm-up ({} bars)",
            instrument,
            bars.len()
        );
    }
    info!(
        "Historical candlestick data fetched for {}: {} bars after enrichment",
        instrument,
        bars.len()
    );

    let mut agent = QLearningAgent::new(AgentConfig {
        num_features: settings.agent.num_features,
        learning_rate: settings.agent.learning_rate,
        discount_factor: settings.agent.discount_factor,
        exploration_prob: settings.agent.exploration_prob,
    });
    agent.train(&bars).context("Batch training failed")?;

    LivePipeline::new(settings, instrument, agent, candles, bars, history, broker)
}
