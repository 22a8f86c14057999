//! Inventory-aware market maker.
//!
//! On every tick the strategy:
//! 1. records the mid in the rolling window,
//! 2. re-estimates volatility (population std-dev of simple returns),
//! 3. smooths a theoretical mid with an EMA over the last 20 samples,
//! 4. quotes a volatility-widened spread skewed against inventory,
//! 5. signals when the market crosses its own quotes, or flattens part of
//!    the book once utilization passes the rebalance threshold.

use serde::{Deserialize, Serialize};

use super::{PriceWindow, StrategyOverrides, StrategyState, TradingStrategy, capped_size};
use crate::domain::types::{StrategyKind, TradeSide, TradeSignal, mid_price};

/// Volatility assumed until the window holds enough samples.
const FALLBACK_VOLATILITY: f64 = 0.02;
/// Samples needed before volatility is estimated.
const MIN_VOLATILITY_SAMPLES: usize = 10;
/// Samples needed before the EMA replaces the raw mid.
const MIN_EMA_SAMPLES: usize = 5;
/// Samples the EMA is computed over.
const EMA_LOOKBACK: usize = 20;
const MIN_PRICE: f64 = 0.01;
const MAX_PRICE: f64 = 0.99;
/// Minimum gap forced between bid and ask after clamping.
const MIN_TICK: f64 = 0.01;

/// Market-maker tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerConfig {
    /// Base full spread in basis points.
    pub spread_bps: f64,
    pub max_inventory: i64,
    /// Fraction of the half-spread shifted per unit of inventory ratio.
    pub inventory_skew_factor: f64,
    pub min_edge_bps: f64,
    pub order_size: u32,
    /// Utilization above which the book is flattened.
    pub rebalance_threshold: f64,
    /// EMA smoothing period.
    pub ema_period: usize,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            spread_bps: 200.0,
            max_inventory: 100,
            inventory_skew_factor: 0.5,
            min_edge_bps: 50.0,
            order_size: 10,
            rebalance_threshold: 0.7,
            ema_period: 10,
        }
    }
}

/// A two-sided quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    pub bid_size: u32,
    pub ask_size: u32,
}

/// Exponential moving average with `k = 2 / (period + 1)`, seeded with the
/// first sample. Returns 0.5 for an empty series.
pub fn ema(prices: impl IntoIterator<Item = f64>, period: usize) -> f64 {
    let k = 2.0 / (period as f64 + 1.0);
    let mut iter = prices.into_iter();
    let Some(first) = iter.next() else {
        return 0.5;
    };
    iter.fold(first, |acc, p| p * k + acc * (1.0 - k))
}

/// Population standard deviation.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

fn scaled_size(order_size: u32, factor: f64) -> u32 {
    (f64::from(order_size) * factor).round().max(1.0) as u32
}

#[derive(Debug, Clone)]
pub struct MarketMakerStrategy {
    config: MarketMakerConfig,
    state: StrategyState,
    window: PriceWindow,
    volatility: f64,
}

impl MarketMakerStrategy {
    pub fn new(config: MarketMakerConfig) -> Self {
        Self {
            config,
            state: StrategyState::default(),
            window: PriceWindow::default(),
            volatility: 0.0,
        }
    }

    pub fn config(&self) -> &MarketMakerConfig {
        &self.config
    }

    /// Latest volatility estimate.
    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    fn inventory_utilization(&self) -> f64 {
        self.state.inventory.unsigned_abs() as f64 / self.config.max_inventory as f64
    }

    fn on_price_update(&mut self, yes_price: f64, no_price: f64) -> Quote {
        let mid = mid_price(yes_price, no_price);
        self.state.mid_price = mid;
        self.window.push(mid);

        self.update_volatility();
        self.update_theoretical_mid();
        self.generate_quotes()
    }

    fn update_volatility(&mut self) {
        self.volatility = if self.window.len() < MIN_VOLATILITY_SAMPLES {
            FALLBACK_VOLATILITY
        } else {
            population_std_dev(&self.window.simple_returns()).unwrap_or(FALLBACK_VOLATILITY)
        };
    }

    fn update_theoretical_mid(&mut self) {
        self.state.theoretical_mid = if self.window.len() < MIN_EMA_SAMPLES {
            self.state.mid_price
        } else {
            ema(self.window.tail(EMA_LOOKBACK), self.config.ema_period)
        };
    }

    fn generate_quotes(&mut self) -> Quote {
        let cfg = &self.config;

        let base_spread = cfg.spread_bps / 10_000.0;
        let half_spread = base_spread * (1.0 + self.volatility * 10.0) / 2.0;

        let inventory_ratio = self.state.inventory as f64 / cfg.max_inventory as f64;
        let skew = inventory_ratio * cfg.inventory_skew_factor * half_spread;

        let mid = self.state.theoretical_mid;
        let mut bid = (mid - half_spread - skew).clamp(MIN_PRICE, MAX_PRICE);
        let mut ask = (mid + half_spread - skew).clamp(MIN_PRICE, MAX_PRICE);
        if ask <= bid {
            // collapsed by the clamp: open a one-tick gap inside the band
            if bid + MIN_TICK <= MAX_PRICE {
                ask = bid + MIN_TICK;
            } else {
                bid = MAX_PRICE - MIN_TICK;
                ask = MAX_PRICE;
            }
        }

        // reducing side gets up to 1.5x, increasing side down to 0.5x
        let utilization = self.inventory_utilization();
        let (bid_size, ask_size) = match self.state.inventory.signum() {
            1 => (
                scaled_size(cfg.order_size, 1.0 - utilization * 0.5),
                scaled_size(cfg.order_size, 1.0 + utilization * 0.5),
            ),
            -1 => (
                scaled_size(cfg.order_size, 1.0 + utilization * 0.5),
                scaled_size(cfg.order_size, 1.0 - utilization * 0.5),
            ),
            _ => (cfg.order_size.max(1), cfg.order_size.max(1)),
        };

        self.state.bid_price = Some(bid);
        self.state.ask_price = Some(ask);

        Quote {
            bid,
            ask,
            bid_size,
            ask_size,
        }
    }

    fn rebalance_signal(&self, current_price: f64) -> Option<TradeSignal> {
        let inventory = self.state.inventory;
        if inventory == 0 {
            return None;
        }
        let position = if inventory > 0 {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };
        let held = u32::try_from(inventory.unsigned_abs()).unwrap_or(u32::MAX);
        Some(TradeSignal {
            side: position.opposite(),
            price: current_price,
            size: self.config.order_size.min(held),
            edge: 0.0,
        })
    }
}

impl Default for MarketMakerStrategy {
    fn default() -> Self {
        Self::new(MarketMakerConfig::default())
    }
}

impl TradingStrategy for MarketMakerStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MarketMaker
    }

    fn evaluate_trade(&mut self, yes_price: f64, no_price: f64) -> Option<TradeSignal> {
        let quote = self.on_price_update(yes_price, no_price);
        let max_inventory = self.config.max_inventory;

        if self.inventory_utilization() > self.config.rebalance_threshold {
            return self.rebalance_signal(yes_price);
        }

        let inventory = self.state.inventory;
        if yes_price < quote.bid {
            return Some(TradeSignal {
                side: TradeSide::Buy,
                price: yes_price,
                size: capped_size(TradeSide::Buy, quote.bid_size, inventory, max_inventory)?,
                edge: (quote.bid - yes_price) * 100.0,
            });
        }

        if yes_price > quote.ask {
            return Some(TradeSignal {
                side: TradeSide::Sell,
                price: yes_price,
                size: capped_size(TradeSide::Sell, quote.ask_size, inventory, max_inventory)?,
                edge: (yes_price - quote.ask) * 100.0,
            });
        }

        None
    }

    fn on_fill(&mut self, side: TradeSide, price: f64, size: u32) {
        self.state.apply_fill(side, price, size);
    }

    fn state(&self) -> StrategyState {
        self.state.clone()
    }

    fn reset(&mut self) {
        self.state = StrategyState::default();
        self.window.clear();
        self.volatility = 0.0;
    }

    fn update_config(&mut self, overrides: &StrategyOverrides) {
        let cfg = &mut self.config;
        if let Some(v) = overrides.order_size {
            cfg.order_size = v;
        }
        if let Some(v) = overrides.max_inventory {
            cfg.max_inventory = v;
        }
        if let Some(v) = overrides.min_edge_bps {
            cfg.min_edge_bps = v;
        }
        if let Some(v) = overrides.spread_bps {
            cfg.spread_bps = v;
        }
        if let Some(v) = overrides.inventory_skew_factor {
            cfg.inventory_skew_factor = v;
        }
        if let Some(v) = overrides.rebalance_threshold {
            cfg.rebalance_threshold = v;
        }
        if let Some(v) = overrides.ema_period {
            cfg.ema_period = v;
        }
    }
}
