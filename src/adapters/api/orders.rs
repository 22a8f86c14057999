//! Kalshi Broker — Adapter for Order Placement and Price Snapshots
//!
//! Implements the `OrderExecution` and `PriceSource` ports on top of the
//! shared `RestClient`. Every order is a YES-side limit order; the demo or
//! production venue is picked per call from the `simulated` flag.

use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::client::RestClient;
use crate::config::{ApiConfig, RateLimitConfig};
use crate::domain::types::{MarketPrices, TradeExecution, TradeSide, TradeSignal};
use crate::ports::execution::{OrderExecution, PriceSource};

/// Price used when the venue omits an ask (cents).
const DEFAULT_ASK_CENTS: f64 = 50.0;

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    ticker: &'a str,
    action: &'static str,
    side: &'static str,
    #[serde(rename = "type")]
    order_type: &'static str,
    count: u32,
    yes_price: u32,
    client_order_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    #[serde(default)]
    order: Option<OrderBody>,
}

#[derive(Debug, Deserialize)]
struct OrderBody {
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MarketResponse {
    #[serde(default)]
    market: Option<MarketBody>,
}

#[derive(Debug, Deserialize)]
struct MarketBody {
    #[serde(default)]
    yes_ask: Option<f64>,
    #[serde(default)]
    no_ask: Option<f64>,
}

/// Limit price in whole cents, clamped to the tradable band 1..=99.
pub fn price_in_cents(price: f64) -> u32 {
    (price * 100.0).round().clamp(1.0, 99.0) as u32
}

fn ask_or_default(cents: Option<f64>) -> f64 {
    cents.filter(|c| *c > 0.0).unwrap_or(DEFAULT_ASK_CENTS) / 100.0
}

/// Kalshi REST broker.
pub struct KalshiBroker {
    client: Arc<RestClient>,
    api: ApiConfig,
    limiter: DefaultDirectRateLimiter,
    max_orders_per_minute: u32,
}

impl KalshiBroker {
    pub fn new(client: Arc<RestClient>, api: &ApiConfig, limits: &RateLimitConfig) -> Self {
        let per_minute = NonZeroU32::new(limits.max_orders_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            client,
            api: api.clone(),
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            max_orders_per_minute: per_minute.get(),
        }
    }

    async fn submit(&self, signal: &TradeSignal, ticker: &str, simulated: bool) -> Result<Option<String>> {
        let request = CreateOrderRequest {
            ticker,
            action: match signal.side {
                TradeSide::Buy => "buy",
                TradeSide::Sell => "sell",
            },
            side: "yes",
            order_type: "limit",
            count: signal.size,
            yes_price: price_in_cents(signal.price),
            client_order_id: format!("bot-{}", uuid::Uuid::new_v4()),
        };

        let url = format!("{}/portfolio/orders", self.api.base_url(simulated));
        let response: CreateOrderResponse = self.client.post_json(&url, &request).await?;
        Ok(response.order.and_then(|o| o.order_id))
    }
}

#[async_trait]
impl OrderExecution for KalshiBroker {
    #[instrument(skip(self, signal), fields(side = %signal.side, price = signal.price, size = signal.size))]
    async fn place_order(&self, signal: &TradeSignal, ticker: &str, simulated: bool) -> TradeExecution {
        let execution = TradeExecution::pending(signal, simulated);
        let venue = if simulated { "DEMO" } else { "LIVE" };

        if self.limiter.check().is_err() {
            warn!(limit = self.max_orders_per_minute, "Order rate limit reached");
            return execution.failed(format!(
                "Rate limit: {} orders/min",
                self.max_orders_per_minute
            ));
        }

        match self.submit(signal, ticker, simulated).await {
            Ok(order_id) => {
                info!(venue, order_id = ?order_id, ticker, "Order placed");
                execution.accepted(order_id)
            }
            Err(e) => {
                warn!(venue, error = %e, ticker, "Order placement failed");
                execution.failed(format!("{e:#}"))
            }
        }
    }
}

#[async_trait]
impl PriceSource for KalshiBroker {
    #[instrument(skip(self))]
    async fn fetch_prices(&self, ticker: &str, simulated: bool) -> Option<MarketPrices> {
        let url = format!("{}/markets/{ticker}", self.api.base_url(simulated));
        match self.client.get_json::<MarketResponse>(&url).await {
            Ok(MarketResponse {
                market: Some(market),
            }) => Some(MarketPrices::now(
                ask_or_default(market.yes_ask),
                ask_or_default(market.no_ask),
            )),
            Ok(MarketResponse { market: None }) => None,
            Err(e) => {
                warn!(error = %e, ticker, "Failed to fetch market prices");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_in_cents_clamped() {
        assert_eq!(price_in_cents(0.514), 51);
        assert_eq!(price_in_cents(0.999), 99);
        assert_eq!(price_in_cents(0.001), 1);
        assert_eq!(price_in_cents(-0.3), 1);
    }

    #[test]
    fn test_missing_or_zero_ask_defaults_to_half() {
        assert!((ask_or_default(None) - 0.5).abs() < 1e-12);
        assert!((ask_or_default(Some(0.0)) - 0.5).abs() < 1e-12);
        assert!((ask_or_default(Some(37.0)) - 0.37).abs() < 1e-12);
    }

    #[test]
    fn test_order_request_shape() {
        let req = CreateOrderRequest {
            ticker: "KX-1",
            action: "sell",
            side: "yes",
            order_type: "limit",
            count: 20,
            yes_price: 45,
            client_order_id: "bot-1".to_string(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "limit");
        assert_eq!(json["side"], "yes");
        assert_eq!(json["yes_price"], 45);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_without_network() {
        let client = Arc::new(RestClient::new(Default::default()).unwrap());
        let broker = KalshiBroker::new(
            client,
            &ApiConfig {
                demo_url: "http://127.0.0.1:9".to_string(),
                ..ApiConfig::default()
            },
            &RateLimitConfig {
                max_orders_per_minute: 1,
            },
        );
        // consume the single permit
        assert!(broker.limiter.check().is_ok());

        let signal = TradeSignal {
            side: TradeSide::Buy,
            price: 0.4,
            size: 1,
            edge: 0.1,
        };
        let exec = broker.place_order(&signal, "KX-1", true).await;
        assert!(!exec.success);
        assert!(exec.error.unwrap().contains("Rate limit"));
        assert!(exec.simulated);
    }
}
