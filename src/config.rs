//! Runtime settings loaded from cfg/parameters.yaml

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::candle::Bar;

/// Top-level settings file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub candlestick: CandlestickSettings,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub trading_mode: TradingMode,
    /// Order size in instrument units
    #[serde(default = "default_units")]
    pub units: i64,
    pub agent: AgentSettings,
    /// Per-instrument order parameters, keyed by instrument name
    pub instruments: HashMap<String, InstrumentSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CandlestickSettings {
    /// Granularity code, e.g. "M1", "M5", "H1"
    pub granularity: String,
    /// Number of historical candles to request
    pub count: usize,
}

/// Q-learning hyperparameters as configured
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSettings {
    pub num_features: usize,
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub exploration_prob: f64,
}

/// Order parameters for one instrument
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct InstrumentSpec {
    /// Decimal places for order prices
    pub precision: u32,
    /// Stop-loss distance in price units
    pub stop_loss: f64,
    /// Take-profit distance in price units
    pub take_profit: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TradingMode {
    #[default]
    Paper,
    Live,
}

impl Settings {
    /// Load and validate settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.candlestick.count < 2 {
            anyhow::bail!("candlestick.count must be at least 2");
        }
        if self.agent.num_features < Bar::NUM_FEATURES {
            anyhow::bail!(
                "agent.num_features must be at least {} (the bar feature width), got {}",
                Bar::NUM_FEATURES,
                self.agent.num_features
            );
        }
        for (name, value) in [
            ("learning_rate", self.agent.learning_rate),
            ("discount_factor", self.agent.discount_factor),
            ("exploration_prob", self.agent.exploration_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("agent.{} must be in [0, 1], got {}", name, value);
            }
        }
        Ok(())
    }

    /// Look up the order parameters for an instrument
    pub fn instrument(&self, name: &str) -> anyhow::Result<InstrumentSpec> {
        self.instruments
            .get(name)
            .copied()
            .with_context(|| format!("Instrument {} is not configured in settings", name))
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_units() -> i64 {
    1000
}
