//! Order gateway - market orders with bracketed stop-loss/take-profit

use anyhow::Context;
use reqwest::Client;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Action;
use crate::config::{InstrumentSpec, TradingMode};

/// Outcome of one order submission
#[derive(Debug, Clone)]
pub struct OrderResult {
    pub order_id: Uuid,
    pub submitted: bool,
    pub message: String,
}

/// Broker client for one account
pub struct BrokerClient {
    client: Client,
    base_url: String,
    token: String,
    account_id: String,
    mode: TradingMode,
}

impl BrokerClient {
    pub fn new(
        base_url: &str,
        token: &str,
        account_id: &str,
        mode: TradingMode,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            account_id: account_id.to_string(),
            mode,
        })
    }

    /// Place a market order for a non-Hold action.
    ///
    /// Stop-loss and take-profit prices are bracketed around the
    /// reference price at the configured distances and rounded to the
    /// instrument's precision. Hold returns without submitting anything.
    pub async fn place_order(
        &self,
        instrument: &str,
        action: Action,
        units: i64,
        reference_price: f64,
        spec: InstrumentSpec,
    ) -> anyhow::Result<Option<OrderResult>> {
        let signed_units = match action {
            Action::Buy => units,
            Action::Sell => -units,
            Action::Hold => return Ok(None),
        };

        let (stop_loss, take_profit) = bracket_prices(action, reference_price, spec)
            .context("Failed to compute bracket prices")?;
        let order_id = Uuid::new_v4();

        if self.mode == TradingMode::Paper {
            info!(
                "[paper] {} {} units of {} @ ~{:.5} | SL {} | TP {}",
                action, signed_units.abs(), instrument, reference_price, stop_loss, take_profit
            );
            return Ok(Some(OrderResult {
                order_id,
                submitted: false,
                message: "Paper order simulated".to_string(),
            }));
        }

        let url = format!(
            "{}/v3/accounts/{}/orders",
            self.base_url, self.account_id
        );
        let body = serde_json::json!({
            "order": {
                "type": "MARKET",
                "instrument": instrument,
                "units": signed_units.to_string(),
                "timeInForce": "FOK",
                "positionFill": "DEFAULT",
                "stopLossOnFill": { "price": stop_loss.to_string() },
                "takeProfitOnFill": { "price": take_profit.to_string() },
                "clientExtensions": { "id": order_id.to_string() },
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("Order request failed")?;

        if response.status().is_success() {
            info!(
                "Order {} submitted: {} {} units of {}",
                order_id, action, signed_units.abs(), instrument
            );
            Ok(Some(OrderResult {
                order_id,
                submitted: true,
                message: "Order submitted".to_string(),
            }))
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("Order {} rejected: {} - {}", order_id, status, text);
            anyhow::bail!("Order submission failed: {} - {}", status, text)
        }
    }
}

/// Stop-loss/take-profit prices around the reference, rounded to the
/// instrument precision. Buy brackets below/above; Sell mirrors.
fn bracket_prices(
    action: Action,
    reference_price: f64,
    spec: InstrumentSpec,
) -> anyhow::Result<(Decimal, Decimal)> {
    let price = Decimal::try_from(reference_price).context("Reference price is not finite")?;
    let stop_distance = Decimal::try_from(spec.stop_loss).context("Invalid stop-loss distance")?;
    let profit_distance =
        Decimal::try_from(spec.take_profit).context("Invalid take-profit distance")?;

    let (stop_loss, take_profit) = match action {
        Action::Sell => (price + stop_distance, price - profit_distance),
        _ => (price - stop_distance, price + profit_distance),
    };

    Ok((
        stop_loss.round_dp(spec.precision),
        take_profit.round_dp(spec.precision),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn spec() -> InstrumentSpec {
        InstrumentSpec {
            precision: 5,
            stop_loss: 0.0005,
            take_profit: 0.001,
        }
    }

    #[test]
    fn buy_brackets_below_and_above() {
        let (sl, tp) = bracket_prices(Action::Buy, 1.08550, spec()).unwrap();
        assert_eq!(sl, Decimal::from_str("1.08500").unwrap());
        assert_eq!(tp, Decimal::from_str("1.08650").unwrap());
    }

    #[test]
    fn sell_brackets_mirror() {
        let (sl, tp) = bracket_prices(Action::Sell, 1.08550, spec()).unwrap();
        assert_eq!(sl, Decimal::from_str("1.08600").unwrap());
        assert_eq!(tp, Decimal::from_str("1.08450").unwrap());
    }

    #[test]
    fn prices_rounded_to_precision() {
        let spec = InstrumentSpec {
            precision: 3,
            stop_loss: 0.05,
            take_profit: 0.1,
        };
        let (sl, tp) = bracket_prices(Action::Buy, 157.12345, spec).unwrap();
        assert_eq!(sl, Decimal::from_str("157.073").unwrap());
        assert_eq!(tp, Decimal::from_str("157.223").unwrap());
    }
}
