//! Live pipeline - one worker per instrument drives the agent on new bars

use anyhow::Context;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::agent::{AgentError, QLearningAgent};
use crate::broker::BrokerClient;
use crate::candle::{Bar, Candle};
use crate::config::{InstrumentSpec, Settings};
use crate::history::HistoryClient;
use crate::indicators;

/// Owns one agent, its bar window and the order route for one instrument.
///
/// The agent itself is synchronous; this wrapper is the only place that
/// suspends. Exactly one pipeline owns any given agent.
pub struct LivePipeline {
    instrument: String,
    spec: InstrumentSpec,
    granularity: String,
    poll_interval: Duration,
    units: i64,
    window_len: usize,
    agent: QLearningAgent,
    /// Raw candle window for indicator lead-in
    candles: Vec<Candle>,
    /// Enriched bars handed to the agent as history
    bars: Vec<Bar>,
    history: HistoryClient,
    broker: BrokerClient,
}

impl LivePipeline {
    pub fn new(
        settings: &Settings,
        instrument: &str,
        agent: QLearningAgent,
        candles: Vec<Candle>,
        bars: Vec<Bar>,
        history: HistoryClient,
        broker: BrokerClient,
    ) -> anyhow::Result<Self> {
        let spec = settings.instrument(instrument)?;
        Ok(Self {
            instrument: instrument.to_string(),
            spec,
            granularity: settings.candlestick.granularity.clone(),
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            units: settings.units,
            window_len: settings.candlestick.count,
            agent,
            candles,
            bars,
            history,
            broker,
        })
    }

    /// Poll for new bars until the task is aborted.
    ///
    /// Transport failures skip the tick; agent contract violations are
    /// bugs in configuration or wiring and abort the worker.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(
            "Starting live pipeline for {} ({} bars of history)",
            self.instrument,
            self.bars.len()
        );

        let mut ticker = interval(self.poll_interval);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(true) => {}
                Ok(false) => debug!("No new candle for {}", self.instrument),
                Err(e) => {
                    if e.is::<AgentError>() {
                        error!("Agent contract violation for {}: {}", self.instrument, e);
                        return Err(e);
                    }
                    warn!("Tick skipped for {}: {}", self.instrument, e);
                }
            }
        }
    }

    /// Fetch the latest complete candle and, if it is new, run one live
    /// agent step and route the action. Returns whether a step ran.
    async fn poll_once(&mut self) -> anyhow::Result<bool> {
        let candle = self
            .history
            .latest_candle(&self.instrument, &self.granularity)
            .await?;

        let last_seen = self.candles.last().map(|c| c.time);
        if last_seen.is_some_and(|t| candle.time <= t) {
            return Ok(false);
        }

        self.candles.push(candle);
        let new_bar = match indicators::enrich_latest(&self.candles) {
            Some(bar) => bar,
            None => {
                debug!("Indicator window still filling for {}", self.instrument);
                return Ok(false);
            }
        };

        let action = self
            .agent
            .live_update(&self.bars, std::slice::from_ref(&new_bar))
            .context("Live update failed")?;

        let reference_price = new_bar.close();
        if let Err(e) = self
            .broker
            .place_order(
                &self.instrument,
                action,
                self.units,
                reference_price,
                self.spec,
            )
            .await
        {
            warn!("Order routing failed for {}: {}", self.instrument, e);
        }

        self.bars.push(new_bar);
        if self.candles.len() > self.window_len {
            self.candles.remove(0);
        }
        if self.bars.len() > self.window_len {
            self.bars.remove(0);
        }

        Ok(true)
    }
}
