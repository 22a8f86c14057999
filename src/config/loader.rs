//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    ticker = %config.trading.market_ticker,
    strategy = %config.bot.strategy,
    dry_run = config.bot.dry_run,
    edge_pct = config.trading.edge_threshold_percent,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Positive sizes and limits
/// - Valid probability / percentage ranges
/// - Non-empty endpoints
pub fn validate_config(config: &AppConfig) -> Result<()> {
  // Trading validation
  let trading = &config.trading;
  anyhow::ensure!(
    trading.edge_threshold_percent > 0.0 && trading.edge_threshold_percent < 100.0,
    "edge_threshold_percent must be in (0, 100), got {}",
    trading.edge_threshold_percent
  );
  anyhow::ensure!(trading.order_size > 0, "order_size must be positive");
  anyhow::ensure!(
    trading.max_position > 0,
    "max_position must be positive, got {}",
    trading.max_position
  );

  // Strategy validation
  let mm = &config.market_maker;
  anyhow::ensure!(
    mm.spread_bps >= 0.0,
    "market_maker.spread_bps must be non-negative, got {}",
    mm.spread_bps
  );
  anyhow::ensure!(
    mm.max_inventory > 0,
    "market_maker.max_inventory must be positive"
  );
  anyhow::ensure!(
    mm.rebalance_threshold > 0.0 && mm.rebalance_threshold <= 1.0,
    "market_maker.rebalance_threshold must be in (0, 1], got {}",
    mm.rebalance_threshold
  );
  anyhow::ensure!(mm.ema_period > 0, "market_maker.ema_period must be positive");
  anyhow::ensure!(mm.order_size > 0, "market_maker.order_size must be positive");

  let mo = &config.momentum;
  anyhow::ensure!(
    mo.lookback_period > 0 && mo.lookback_period < crate::domain::strategy::PRICE_WINDOW_CAPACITY,
    "momentum.lookback_period must be in [1, {}), got {}",
    crate::domain::strategy::PRICE_WINDOW_CAPACITY,
    mo.lookback_period
  );
  anyhow::ensure!(
    mo.momentum_threshold > 0.0,
    "momentum.momentum_threshold must be positive"
  );

  // Feed validation
  anyhow::ensure!(
    !config.feed.prod_ws_url.is_empty() && !config.feed.demo_ws_url.is_empty(),
    "WebSocket URLs must not be empty"
  );
  anyhow::ensure!(
    config.feed.reconnect_base_delay_ms > 0,
    "feed.reconnect_base_delay_ms must be positive"
  );
  anyhow::ensure!(
    config.feed.ping_interval_secs > 0,
    "feed.ping_interval_secs must be positive"
  );

  // Rate limit validation
  anyhow::ensure!(
    config.rate_limits.max_orders_per_minute > 0,
    "max_orders_per_minute must be positive, got {}",
    config.rate_limits.max_orders_per_minute
  );

  // API validation
  anyhow::ensure!(
    !config.api.prod_url.is_empty() && !config.api.demo_url.is_empty(),
    "REST API URLs must not be empty"
  );

  anyhow::ensure!(
    config.esports.poll_interval_ms > 0,
    "esports.poll_interval_ms must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::types::StrategyKind;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_empty_file_yields_defaults() {
    let config = parse_config("").unwrap();
    assert!(config.bot.dry_run);
    assert_eq!(config.bot.strategy, StrategyKind::MarketMaker);
    assert_eq!(config.feed.max_reconnect_attempts, 5);
    assert_eq!(config.market_maker.ema_period, 10);
  }

  #[test]
  fn test_partial_tables_keep_defaults() {
    let config = parse_config(
      r#"
        [bot]
        strategy = "momentum"

        [trading]
        market_ticker = "KXLOL-25"
        order_size = 4

        [market_maker]
        spread_bps = 300.0
      "#,
    )
    .unwrap();
    assert_eq!(config.bot.strategy, StrategyKind::Momentum);
    assert_eq!(config.trading.order_size, 4);
    assert_eq!(config.trading.max_position, 100);
    assert_eq!(config.market_maker.spread_bps, 300.0);
    assert_eq!(config.market_maker.max_inventory, 100);
  }

  #[test]
  fn test_rejects_out_of_range_values() {
    let err = parse_config("[trading]\nedge_threshold_percent = 0.0\n").unwrap_err();
    assert!(err.to_string().contains("edge_threshold_percent"));

    assert!(parse_config("[market_maker]\nrebalance_threshold = 1.5\n").is_err());
    assert!(parse_config("[rate_limits]\nmax_orders_per_minute = 0\n").is_err());
  }

  #[test]
  fn test_shipped_config_parses() {
    let config = parse_config(include_str!("../../config.toml")).unwrap();
    assert_eq!(config.esports.poll_interval_ms, 2000);
    assert!(config.esports.match_target.is_none());
  }

  #[test]
  fn test_match_target_table() {
    let config = parse_config(
      "[esports]\nmatch_target = { game = \"lol\", match_id = \"991\" }\n",
    )
    .unwrap();
    let target = config.esports.match_target.unwrap();
    assert_eq!(target.game, crate::domain::types::GameType::Lol);
    assert_eq!(target.match_id, "991");
  }

  #[test]
  fn test_rejects_unknown_strategy() {
    assert!(parse_config("[bot]\nstrategy = \"grid\"\n").is_err());
  }
}
