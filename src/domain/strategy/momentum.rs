//! Lookback momentum strategy.
//!
//! Buys when the mid has risen more than `momentum_threshold` over the
//! last `lookback_period` ticks and sells on the symmetric drop. Quotes
//! are display-only: `mid ∓ 1¢`.

use serde::{Deserialize, Serialize};

use super::{PriceWindow, StrategyOverrides, StrategyState, TradingStrategy, capped_size};
use crate::domain::types::{StrategyKind, TradeSide, TradeSignal, mid_price};

const DISPLAY_HALF_SPREAD: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub lookback_period: usize,
    /// Simple-return threshold (0.02 = 2%).
    pub momentum_threshold: f64,
    pub order_size: u32,
    pub max_inventory: i64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback_period: 5,
            momentum_threshold: 0.02,
            order_size: 10,
            max_inventory: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    config: MomentumConfig,
    state: StrategyState,
    window: PriceWindow,
}

impl MomentumStrategy {
    pub fn new(config: MomentumConfig) -> Self {
        Self {
            config,
            state: StrategyState::default(),
            window: PriceWindow::default(),
        }
    }

    pub fn config(&self) -> &MomentumConfig {
        &self.config
    }

    /// Simple return over the lookback, once enough samples exist.
    fn momentum(&self) -> Option<f64> {
        let lookback = self.config.lookback_period;
        if self.window.len() < lookback + 1 {
            return None;
        }
        let old = self.window.back(lookback)?;
        let current = self.window.latest()?;
        (old > 0.0).then(|| (current - old) / old)
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new(MomentumConfig::default())
    }
}

impl TradingStrategy for MomentumStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Momentum
    }

    fn evaluate_trade(&mut self, yes_price: f64, no_price: f64) -> Option<TradeSignal> {
        let mid = mid_price(yes_price, no_price);
        self.state.mid_price = mid;
        self.state.theoretical_mid = mid;
        self.window.push(mid);

        let momentum = self.momentum()?;

        self.state.bid_price = Some(mid - DISPLAY_HALF_SPREAD);
        self.state.ask_price = Some(mid + DISPLAY_HALF_SPREAD);

        let MomentumConfig {
            momentum_threshold,
            order_size,
            max_inventory,
            ..
        } = self.config;

        let inventory = self.state.inventory;
        if momentum > momentum_threshold {
            return Some(TradeSignal {
                side: TradeSide::Buy,
                price: yes_price,
                size: capped_size(TradeSide::Buy, order_size, inventory, max_inventory)?,
                edge: momentum * 100.0,
            });
        }

        if momentum < -momentum_threshold {
            return Some(TradeSignal {
                side: TradeSide::Sell,
                price: yes_price,
                size: capped_size(TradeSide::Sell, order_size, inventory, max_inventory)?,
                edge: momentum.abs() * 100.0,
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
    }

    fn update_config(&mut self, overrides: &StrategyOverrides) {
        let cfg = &mut self.config;
        if let Some(v) = overrides.lookback_period {
            cfg.lookback_period = v;
        }
        if let Some(v) = overrides.momentum_threshold {
            cfg.momentum_threshold = v;
        }
        if let Some(v) = overrides.order_size {
            cfg.order_size = v;
        }
        if let Some(v) = overrides.max_inventory {
            cfg.max_inventory = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(strategy: &mut MomentumStrategy, mids: &[f64]) -> Option<TradeSignal> {
        let mut last = None;
        for &m in mids {
            // yes = m, no = 1 - m gives mid = m
            last = strategy.evaluate_trade(m, 1.0 - m);
        }
        last
    }

    #[test]
    fn test_silent_until_lookback_filled() {
        let mut s = MomentumStrategy::default();
        assert!(feed(&mut s, &[0.40, 0.42, 0.44, 0.46, 0.48]).is_none());
        assert_eq!(s.state().bid_price, None);
    }

    #[test]
    fn test_buy_on_upward_momentum() {
        let mut s = MomentumStrategy::default();
        let signal = feed(&mut s, &[0.40, 0.41, 0.42, 0.43, 0.44, 0.45]).unwrap();
        assert_eq!(signal.side, TradeSide::Buy);
        assert!((signal.edge - 12.5).abs() < 1e-6);
        let state = s.state();
        assert!((state.bid_price.unwrap() - 0.44).abs() < 1e-9);
        assert!((state.ask_price.unwrap() - 0.46).abs() < 1e-9);
    }

    #[test]
    fn test_sell_on_downward_momentum() {
        let mut s = MomentumStrategy::default();
        let signal = feed(&mut s, &[0.50, 0.50, 0.50, 0.50, 0.50, 0.45]).unwrap();
        assert_eq!(signal.side, TradeSide::Sell);
        assert!((signal.edge - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_market_no_signal() {
        let mut s = MomentumStrategy::default();
        assert!(feed(&mut s, &[0.5; 8]).is_none());
    }

    #[test]
    fn test_long_cap_blocks_buy() {
        let mut s = MomentumStrategy::default();
        s.on_fill(TradeSide::Buy, 0.4, 100);
        assert!(feed(&mut s, &[0.40, 0.41, 0.42, 0.43, 0.44, 0.45]).is_none());
        assert!((s.unrealized_pnl(0.5) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_last_buy_trimmed_to_headroom() {
        let mut s = MomentumStrategy::new(MomentumConfig {
            order_size: 30,
            ..MomentumConfig::default()
        });
        let mut sizes = Vec::new();
        for i in 0..20 {
            let m = 0.40 + 0.01 * f64::from(i);
            if let Some(signal) = s.evaluate_trade(m, 1.0 - m) {
                assert_eq!(signal.side, TradeSide::Buy);
                sizes.push(signal.size);
                s.on_fill(signal.side, signal.price, signal.size);
            }
        }
        assert_eq!(sizes, vec![30, 30, 30, 10]);
        assert_eq!(s.state().inventory, 100);
    }

    #[test]
    fn test_update_config_partial() {
        let mut s = MomentumStrategy::default();
        s.update_config(&StrategyOverrides {
            lookback_period: Some(2),
            ..StrategyOverrides::default()
        });
        assert_eq!(s.config().lookback_period, 2);
        assert_eq!(s.config().order_size, 10);
        assert!(feed(&mut s, &[0.40, 0.42, 0.44]).is_some());
    }
}
