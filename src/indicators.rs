//! Indicator enrichment for historical candles

use crate::candle::{Bar, Candle};

/// Fast SMA window
pub const SMA_FAST_PERIOD: usize = 12;
/// Slow SMA window
pub const SMA_SLOW_PERIOD: usize = 26;
/// RSI window
pub const RSI_PERIOD: usize = 14;

/// Append SMA and RSI columns to a candle series.
///
/// Leading candles without a full slow-SMA window are dropped, so the
/// returned series starts at the first fully-computed row.
pub fn enrich(candles: &[Candle]) -> Vec<Bar> {
    let mut bars = Vec::new();

    for i in 0..candles.len() {
        let window = &candles[..=i];

        let sma_fast = sma(window, SMA_FAST_PERIOD);
        let sma_slow = sma(window, SMA_SLOW_PERIOD);
        let rsi = rsi(window, RSI_PERIOD);

        if let (Some(sma_fast), Some(sma_slow), Some(rsi)) = (sma_fast, sma_slow, rsi) {
            bars.push(Bar {
                candle: candles[i].clone(),
                sma_fast,
                sma_slow,
                rsi,
            });
        }
    }

    bars
}

/// Enrich the newest candle against a rolling window that already has
/// enough lead-in. Returns None while the window is still too short.
pub fn enrich_latest(window: &[Candle]) -> Option<Bar> {
    let sma_fast = sma(window, SMA_FAST_PERIOD)?;
    let sma_slow = sma(window, SMA_SLOW_PERIOD)?;
    let rsi = rsi(window, RSI_PERIOD)?;

    window.last().map(|candle| Bar {
        candle: candle.clone(),
        sma_fast,
        sma_slow,
        rsi,
    })
}

/// Simple moving average of the closes over the trailing `period` candles
fn sma(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period {
        return None;
    }
    let sum: f64 = candles.iter().rev().take(period).map(|c| c.close).sum();
    Some(sum / period as f64)
}

/// Relative strength index over the trailing `period` close-to-close moves
fn rsi(candles: &[Candle], period: usize) -> Option<f64> {
    if candles.len() < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    for i in (candles.len() - period)..candles.len() {
        let change = candles[i].close - candles[i - 1].close;
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    if losses == 0.0 {
        return Some(100.0);
    }

    let rs = gains / losses;
    Some(100.0 - (100.0 / (1.0 + rs)))
}
