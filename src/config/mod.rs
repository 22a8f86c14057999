//! Configuration Module - TOML-based Bot Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Venue endpoints, strategy tunables and rate limits are externalized
//! here - nothing is hardcoded in the domain layer.

pub mod hot_reload;
pub mod loader;

use serde::Deserialize;

use crate::domain::strategy::{MarketMakerConfig, MomentumConfig, StrategyTunables};
use crate::domain::types::{MatchTarget, StrategyKind, TradingConfig};

pub use hot_reload::ConfigWatcher;
pub use loader::load_config;

/// Top-level bot configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the bot begins operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Bot identity and runtime behaviour.
  #[serde(default)]
  pub bot: BotConfig,
  /// Market ticker, edge threshold and sizing handed to `start()`.
  #[serde(default)]
  pub trading: TradingConfig,
  /// Market-maker tunables.
  #[serde(default)]
  pub market_maker: MarketMakerConfig,
  /// Momentum tunables.
  #[serde(default)]
  pub momentum: MomentumConfig,
  /// Streaming market data.
  #[serde(default)]
  pub feed: FeedConfig,
  /// Broker REST endpoints.
  #[serde(default)]
  pub api: ApiConfig,
  /// Rate limiting configuration.
  #[serde(default)]
  pub rate_limits: RateLimitConfig,
  /// Esports game-data provider.
  #[serde(default)]
  pub esports: EsportsConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

impl AppConfig {
  /// Strategy tunables from the `market_maker` and `momentum` tables.
  pub fn tunables(&self) -> StrategyTunables {
    StrategyTunables {
      market_maker: self.market_maker.clone(),
      momentum: self.momentum.clone(),
    }
  }
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable bot name.
  #[serde(default = "default_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Start in dry-run mode (orders go to the demo venue).
  #[serde(default = "default_true")]
  pub dry_run: bool,
  /// Strategy active at startup.
  #[serde(default = "default_strategy")]
  pub strategy: StrategyKind,
  /// Grace period after closing the feed on stop (milliseconds).
  #[serde(default = "default_shutdown_grace")]
  pub shutdown_grace_ms: u64,
}

impl Default for BotConfig {
  fn default() -> Self {
    Self {
      name: default_name(),
      log_level: default_log_level(),
      dry_run: true,
      strategy: default_strategy(),
      shutdown_grace_ms: default_shutdown_grace(),
    }
  }
}

/// WebSocket feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Production WebSocket URL.
  #[serde(default = "default_prod_ws")]
  pub prod_ws_url: String,
  /// Demo WebSocket URL, used when simulated.
  #[serde(default = "default_demo_ws")]
  pub demo_ws_url: String,
  /// First reconnect delay; doubles per attempt (milliseconds).
  #[serde(default = "default_reconnect_base")]
  pub reconnect_base_delay_ms: u64,
  /// Reconnect attempts before a fatal feed error.
  #[serde(default = "default_reconnect_attempts")]
  pub max_reconnect_attempts: u32,
  /// Keep-alive ping interval (seconds).
  #[serde(default = "default_ping_interval")]
  pub ping_interval_secs: u64,
}

impl FeedConfig {
  /// Endpoint for the selected environment.
  pub fn url(&self, simulated: bool) -> &str {
    if simulated { &self.demo_ws_url } else { &self.prod_ws_url }
  }
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      prod_ws_url: default_prod_ws(),
      demo_ws_url: default_demo_ws(),
      reconnect_base_delay_ms: default_reconnect_base(),
      max_reconnect_attempts: default_reconnect_attempts(),
      ping_interval_secs: default_ping_interval(),
    }
  }
}

/// Broker REST configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Production REST base URL.
  #[serde(default = "default_prod_api")]
  pub prod_url: String,
  /// Demo REST base URL, used when simulated.
  #[serde(default = "default_demo_api")]
  pub demo_url: String,
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
  /// Retries on transient (429 / 5xx / network) errors.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
}

impl ApiConfig {
  /// Base URL for the selected environment.
  pub fn base_url(&self, simulated: bool) -> &str {
    if simulated { &self.demo_url } else { &self.prod_url }
  }
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      prod_url: default_prod_api(),
      demo_url: default_demo_api(),
      timeout_seconds: default_timeout(),
      max_retries: default_max_retries(),
    }
  }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
  /// Maximum orders per minute.
  #[serde(default = "default_max_orders")]
  pub max_orders_per_minute: u32,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self {
      max_orders_per_minute: default_max_orders(),
    }
  }
}

/// Esports game-data configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EsportsConfig {
  /// League of Legends live match endpoint prefix.
  #[serde(default = "default_lol_api")]
  pub lol_api_url: String,
  /// Dota 2 match endpoint prefix.
  #[serde(default = "default_dota_api")]
  pub dota_api_url: String,
  /// Poll period (milliseconds).
  #[serde(default = "default_poll_interval")]
  pub poll_interval_ms: u64,
  /// Request timeout in seconds.
  #[serde(default = "default_game_timeout")]
  pub timeout_seconds: u64,
  /// Match tracked at startup. Enables esports mode.
  #[serde(default)]
  pub match_target: Option<MatchTarget>,
}

impl Default for EsportsConfig {
  fn default() -> Self {
    Self {
      lol_api_url: default_lol_api(),
      dota_api_url: default_dota_api(),
      poll_interval_ms: default_poll_interval(),
      timeout_seconds: default_game_timeout(),
      match_target: None,
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

// Default value functions for serde

fn default_name() -> String {
  "prediction-edge-bot".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_strategy() -> StrategyKind {
  StrategyKind::MarketMaker
}

fn default_shutdown_grace() -> u64 {
  500
}

fn default_prod_ws() -> String {
  "wss://api.elections.kalshi.com/trade-api/ws/v2".to_string()
}

fn default_demo_ws() -> String {
  "wss://demo-api.kalshi.co/trade-api/ws/v2".to_string()
}

fn default_reconnect_base() -> u64 {
  1_000
}

fn default_reconnect_attempts() -> u32 {
  5
}

fn default_ping_interval() -> u64 {
  30
}

fn default_prod_api() -> String {
  "https://api.elections.kalshi.com/trade-api/v2".to_string()
}

fn default_demo_api() -> String {
  "https://demo-api.kalshi.co/trade-api/v2".to_string()
}

fn default_timeout() -> u64 {
  30
}

fn default_max_retries() -> u32 {
  3
}

fn default_max_orders() -> u32 {
  50
}

fn default_lol_api() -> String {
  "https://api.pandascore.co/lol/matches".to_string()
}

fn default_dota_api() -> String {
  "https://api.opendota.com/api/matches".to_string()
}

fn default_poll_interval() -> u64 {
  2_000
}

fn default_game_timeout() -> u64 {
  10
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
