//! Pluggable trading strategies.
//!
//! Every strategy consumes YES/NO asks tick by tick, maintains its own
//! inventory and PnL bookkeeping, and may emit a [`TradeSignal`].
//! Selection goes through [`create_strategy`] keyed by [`StrategyKind`].

pub mod market_maker;
pub mod momentum;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::types::{StrategyKind, TradeSide, TradeSignal};

pub use market_maker::{MarketMakerConfig, MarketMakerStrategy, Quote};
pub use momentum::{MomentumConfig, MomentumStrategy};

/// Rolling mid-price window capacity shared by all strategies.
pub const PRICE_WINDOW_CAPACITY: usize = 100;

/// Mutable per-strategy record, recreated on every start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    /// Signed contract count.
    pub inventory: i64,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub mid_price: f64,
    pub theoretical_mid: f64,
    /// Cash flow from fills: sells add, buys subtract.
    pub realized_pnl: f64,
    pub fill_count: u64,
}

impl StrategyState {
    /// Applies a fill to inventory and realized PnL.
    pub fn apply_fill(&mut self, side: TradeSide, price: f64, size: u32) {
        self.inventory += side.signed(size);
        self.realized_pnl -= side.signed(size) as f64 * price;
        self.fill_count += 1;
    }
}

impl Default for StrategyState {
    fn default() -> Self {
        Self {
            inventory: 0,
            bid_price: None,
            ask_price: None,
            mid_price: 0.5,
            theoretical_mid: 0.5,
            realized_pnl: 0.0,
            fill_count: 0,
        }
    }
}

/// Partial tunable update. `None` leaves a field untouched; fields a
/// strategy does not use are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyOverrides {
    pub order_size: Option<u32>,
    pub max_inventory: Option<i64>,
    pub min_edge_bps: Option<f64>,
    pub spread_bps: Option<f64>,
    pub inventory_skew_factor: Option<f64>,
    pub rebalance_threshold: Option<f64>,
    pub ema_period: Option<usize>,
    pub lookback_period: Option<usize>,
    pub momentum_threshold: Option<f64>,
}

/// Capability set every strategy provides.
pub trait TradingStrategy: Send + Sync {
    /// Which implementation this is.
    fn kind(&self) -> StrategyKind;

    /// Feeds one tick and returns the order to place, if any.
    fn evaluate_trade(&mut self, yes_price: f64, no_price: f64) -> Option<TradeSignal>;

    /// Books a confirmed fill.
    fn on_fill(&mut self, side: TradeSide, price: f64, size: u32);

    /// Copy of the current state.
    fn state(&self) -> StrategyState;

    /// Mark-to-market value of the open inventory.
    fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.state().inventory as f64 * current_price
    }

    /// Back to a flat book with an empty price window.
    fn reset(&mut self);

    fn update_config(&mut self, overrides: &StrategyOverrides);
}

/// Largest size on `side` that keeps `|inventory|` within `max_inventory`,
/// or `None` when there is no headroom left.
pub fn capped_size(
    side: TradeSide,
    size: u32,
    inventory: i64,
    max_inventory: i64,
) -> Option<u32> {
    let headroom = match side {
        TradeSide::Buy => max_inventory - inventory,
        TradeSide::Sell => max_inventory + inventory,
    };
    let headroom = u32::try_from(headroom.max(0)).unwrap_or(u32::MAX);
    let size = size.min(headroom);
    (size > 0).then_some(size)
}

/// Configured tunables for every strategy kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyTunables {
    pub market_maker: MarketMakerConfig,
    pub momentum: MomentumConfig,
}

impl StrategyTunables {
    /// Builds a fresh strategy of `kind` from these tunables.
    pub fn build(&self, kind: StrategyKind) -> Box<dyn TradingStrategy> {
        match kind {
            StrategyKind::MarketMaker => {
                Box::new(MarketMakerStrategy::new(self.market_maker.clone()))
            }
            StrategyKind::Momentum => Box::new(MomentumStrategy::new(self.momentum.clone())),
        }
    }

    /// The tunables of `kind` as a full override set.
    pub fn overrides_for(&self, kind: StrategyKind) -> StrategyOverrides {
        match kind {
            StrategyKind::MarketMaker => StrategyOverrides::from(&self.market_maker),
            StrategyKind::Momentum => StrategyOverrides::from(&self.momentum),
        }
    }
}

impl From<&MarketMakerConfig> for StrategyOverrides {
    fn from(c: &MarketMakerConfig) -> Self {
        Self {
            order_size: Some(c.order_size),
            max_inventory: Some(c.max_inventory),
            min_edge_bps: Some(c.min_edge_bps),
            spread_bps: Some(c.spread_bps),
            inventory_skew_factor: Some(c.inventory_skew_factor),
            rebalance_threshold: Some(c.rebalance_threshold),
            ema_period: Some(c.ema_period),
            ..Self::default()
        }
    }
}

impl From<&MomentumConfig> for StrategyOverrides {
    fn from(c: &MomentumConfig) -> Self {
        Self {
            order_size: Some(c.order_size),
            max_inventory: Some(c.max_inventory),
            lookback_period: Some(c.lookback_period),
            momentum_threshold: Some(c.momentum_threshold),
            ..Self::default()
        }
    }
}

/// Builds a fresh strategy of the given kind with default tunables.
pub fn create_strategy(kind: StrategyKind) -> Box<dyn TradingStrategy> {
    StrategyTunables::default().build(kind)
}

/// All selectable strategies.
pub fn available_strategies() -> Vec<StrategyKind> {
    StrategyKind::ALL.to_vec()
}

/// Bounded FIFO of mid prices, oldest evicted first.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, price: f64) {
        if self.prices.len() == self.capacity {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn clear(&mut self) {
        self.prices.clear();
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    /// Sample `n` steps back from the latest (`0` = latest).
    pub fn back(&self, n: usize) -> Option<f64> {
        self.prices
            .len()
            .checked_sub(n + 1)
            .and_then(|i| self.prices.get(i).copied())
    }

    /// The last `n` samples, oldest first.
    pub fn tail(&self, n: usize) -> impl Iterator<Item = f64> + '_ {
        self.prices
            .iter()
            .skip(self.prices.len().saturating_sub(n))
            .copied()
    }

    /// Simple returns between consecutive samples, skipping non-positive
    /// bases.
    pub fn simple_returns(&self) -> Vec<f64> {
        self.prices
            .iter()
            .zip(self.prices.iter().skip(1))
            .filter(|(prev, _)| **prev > 0.0)
            .map(|(prev, curr)| (curr - prev) / prev)
            .collect()
    }
}

impl Default for PriceWindow {
    fn default() -> Self {
        Self::new(PRICE_WINDOW_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut w = PriceWindow::new(3);
        for p in [0.1, 0.2, 0.3, 0.4] {
            w.push(p);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.back(2), Some(0.2));
        assert_eq!(w.latest(), Some(0.4));
        assert_eq!(w.back(3), None);
    }

    #[test]
    fn test_window_tail_and_returns() {
        let mut w = PriceWindow::default();
        for p in [0.5, 0.55, 0.44] {
            w.push(p);
        }
        assert_eq!(w.tail(2).collect::<Vec<_>>(), vec![0.55, 0.44]);
        let r = w.simple_returns();
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-9);
        assert!((r[1] + 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_fill_bookkeeping() {
        let mut s = StrategyState::default();
        s.apply_fill(TradeSide::Buy, 0.40, 10);
        s.apply_fill(TradeSide::Sell, 0.55, 4);
        assert_eq!(s.inventory, 6);
        assert!((s.realized_pnl - (-4.0 + 2.2)).abs() < 1e-9);
        assert_eq!(s.fill_count, 2);
    }

    #[test]
    fn test_capped_size_limits_to_headroom() {
        assert_eq!(capped_size(TradeSide::Buy, 30, 90, 100), Some(10));
        assert_eq!(capped_size(TradeSide::Buy, 30, 100, 100), None);
        assert_eq!(capped_size(TradeSide::Sell, 30, -85, 100), Some(15));
        // reducing side has room for the full size
        assert_eq!(capped_size(TradeSide::Sell, 30, 90, 100), Some(30));
        assert_eq!(capped_size(TradeSide::Buy, 0, 0, 100), None);
    }

    #[test]
    fn test_overrides_round_trip_tunables() {
        let tunables = StrategyTunables {
            momentum: MomentumConfig {
                lookback_period: 3,
                ..MomentumConfig::default()
            },
            ..StrategyTunables::default()
        };
        let mut fresh = MomentumStrategy::default();
        fresh.update_config(&tunables.overrides_for(StrategyKind::Momentum));
        assert_eq!(fresh.config(), &tunables.momentum);
        assert_eq!(
            tunables.overrides_for(StrategyKind::Momentum).spread_bps,
            None
        );
    }

    #[test]
    fn test_factory_covers_every_kind() {
        for kind in available_strategies() {
            assert_eq!(create_strategy(kind).kind(), kind);
        }
    }
}
