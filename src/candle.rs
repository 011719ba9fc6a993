//! Candle and bar types shared by the history, indicator and agent paths

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One OHLCV candle as delivered by the data API
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle enriched with indicator columns.
///
/// This is the row shape the agent consumes: the live path uses the full
/// feature vector as its state, the batch path only the close.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub candle: Candle,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub rsi: f64,
}

impl Bar {
    /// Number of components in [`Bar::features`]
    pub const NUM_FEATURES: usize = 8;

    /// Ordered feature vector: open, high, low, close, volume,
    /// fast SMA, slow SMA, RSI
    pub fn features(&self) -> Vec<f64> {
        vec![
            self.candle.open,
            self.candle.high,
            self.candle.low,
            self.candle.close,
            self.candle.volume,
            self.sma_fast,
            self.sma_slow,
            self.rsi,
        ]
    }

    pub fn close(&self) -> f64 {
        self.candle.close
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.candle.time
    }
}

/// Wire format for one candle row: prices arrive as strings
#[derive(Debug, Deserialize)]
pub struct CandleRow {
    pub time: DateTime<Utc>,
    pub volume: f64,
    pub complete: bool,
    pub mid: MidPrices,
}

#[derive(Debug, Deserialize)]
pub struct MidPrices {
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
}

impl CandleRow {
    /// Parse the string-encoded prices into a [`Candle`]
    pub fn into_candle(self) -> anyhow::Result<Candle> {
        Ok(Candle {
            time: self.time,
            open: self.mid.o.parse()?,
            high: self.mid.h.parse()?,
            low: self.mid.l.parse()?,
            close: self.mid.c.parse()?,
            volume: self.volume,
        })
    }
}
