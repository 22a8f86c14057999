//! Edge-threshold trade evaluator.
//!
//! Stateless decision rule for the belief-model-driven (esports) variant:
//! compare the model probability with the YES ask, then the complement
//! with the NO ask, and signal when either edge clears the threshold.

use super::types::{MarketPrices, TradeSide, TradeSignal};

/// Default minimum edge (5 percentage points).
pub const DEFAULT_EDGE_THRESHOLD: f64 = 0.05;

/// Price improvement over the ask, capped at 99¢.
const PRICE_TICK: f64 = 0.01;
const MAX_PRICE: f64 = 0.99;

/// Edge evaluator with a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeEvaluator {
    edge_threshold: f64,
}

impl TradeEvaluator {
    pub const fn new(edge_threshold: f64) -> Self {
        Self { edge_threshold }
    }

    pub const fn edge_threshold(&self) -> f64 {
        self.edge_threshold
    }

    /// Returns a BUY when the model is richer than the YES ask, a SELL when
    /// the complement is richer than the NO ask, otherwise `None`.
    pub fn evaluate(
        &self,
        model_probability: f64,
        prices: &MarketPrices,
        order_size: u32,
    ) -> Option<TradeSignal> {
        let yes_edge = model_probability - prices.yes_price;
        if yes_edge > self.edge_threshold {
            return Some(TradeSignal {
                side: TradeSide::Buy,
                price: (prices.yes_price + PRICE_TICK).min(MAX_PRICE),
                size: order_size,
                edge: yes_edge,
            });
        }

        let no_edge = (1.0 - model_probability) - prices.no_price;
        if no_edge > self.edge_threshold {
            return Some(TradeSignal {
                side: TradeSide::Sell,
                price: (prices.no_price + PRICE_TICK).min(MAX_PRICE),
                size: order_size,
                edge: no_edge,
            });
        }

        None
    }
}

impl Default for TradeEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_EDGE_THRESHOLD)
    }
}

/// [`TradeEvaluator::evaluate`] with the default threshold.
pub fn evaluate_trade(
    model_probability: f64,
    prices: &MarketPrices,
    order_size: u32,
) -> Option<TradeSignal> {
    TradeEvaluator::default().evaluate(model_probability, prices, order_size)
}
