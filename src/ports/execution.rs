//! Order Execution Port - Broker Interface
//!
//! Defines the traits the controller needs from a venue: placing one
//! limit order per signal and fetching a price snapshot on demand.
//!
//! Key design decisions:
//! - `place_order` never fails at the type level; venue errors come back
//!   as an unsuccessful [`TradeExecution`] so every attempt is logged
//! - `fetch_prices` yields `None` on any failure

use async_trait::async_trait;

use crate::domain::types::{MarketPrices, TradeExecution, TradeSignal};

/// Trait for order execution providers.
#[async_trait]
pub trait OrderExecution: Send + Sync + 'static {
  /// Place a limit order for `signal` on `ticker`.
  ///
  /// `simulated` routes the order to the demo venue.
  async fn place_order(&self, signal: &TradeSignal, ticker: &str, simulated: bool)
  -> TradeExecution;
}

/// Trait for on-demand price snapshots.
#[async_trait]
pub trait PriceSource: Send + Sync + 'static {
  /// Current YES/NO asks for `ticker`, `None` when unavailable.
  ///
  /// `simulated` selects the same venue orders would go to.
  async fn fetch_prices(&self, ticker: &str, simulated: bool) -> Option<MarketPrices>;
}
