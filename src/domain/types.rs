//! Core trading domain types.
//!
//! Defines the entities shared by the belief model, the strategies and the
//! lifecycle controller: market snapshots, trade signals and executions,
//! game events, probability history and the bot state exposed to the UI.
//!
//! Prices are probabilities in dollars (0.00 – 1.00) and sizes are whole
//! contracts, matching what the broker adapters exchange.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────
// Type aliases consumed by ports and adapters
// ────────────────────────────────────────────

/// Market ticker (Kalshi) or condition id (Polymarket).
pub type MarketId = String;

/// Identifier of an esports match on the game-data provider.
pub type MatchId = String;

// ────────────────────────────────────────────
// Orders and executions
// ────────────────────────────────────────────

/// Trade side on the YES contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// The side that closes a position opened on `self`.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Signed inventory change for a fill of `size` contracts.
    pub fn signed(self, size: u32) -> i64 {
        match self {
            Self::Buy => i64::from(size),
            Self::Sell => -i64::from(size),
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Latest two-sided market quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPrices {
    /// Best YES ask.
    pub yes_price: f64,
    /// Best NO ask.
    pub no_price: f64,
    /// When the quote was observed.
    pub timestamp: DateTime<Utc>,
}

impl MarketPrices {
    /// Snapshot taken now.
    pub fn now(yes_price: f64, no_price: f64) -> Self {
        Self {
            yes_price,
            no_price,
            timestamp: Utc::now(),
        }
    }

    /// Mid price implied by both asks: `(yes + (1 - no)) / 2`.
    pub fn mid(&self) -> f64 {
        mid_price(self.yes_price, self.no_price)
    }
}

/// Mid price of a binary market from its YES and NO asks.
pub fn mid_price(yes_price: f64, no_price: f64) -> f64 {
    (yes_price + (1.0 - no_price)) / 2.0
}

/// An order the decision engine wants placed. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub side: TradeSide,
    /// Limit price in dollars.
    pub price: f64,
    /// Contracts.
    pub size: u32,
    /// Edge that motivated the signal (strategy specific units).
    pub edge: f64,
}

/// Outcome of one order attempt, appended to the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExecution {
    /// Broker order id, or a locally generated id when the broker gave none.
    pub id: String,
    pub side: TradeSide,
    pub price: f64,
    pub size: u32,
    pub timestamp: DateTime<Utc>,
    /// Sent to the demo/simulated venue.
    pub simulated: bool,
    pub success: bool,
    /// Failure reason when `success` is false.
    pub error: Option<String>,
}

impl TradeExecution {
    /// A pending execution for `signal` with a fresh local id.
    pub fn pending(signal: &TradeSignal, simulated: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            side: signal.side,
            price: signal.price,
            size: signal.size,
            timestamp: Utc::now(),
            simulated,
            success: false,
            error: None,
        }
    }

    /// Mark as accepted by the venue.
    pub fn accepted(mut self, order_id: Option<String>) -> Self {
        if let Some(id) = order_id {
            self.id = id;
        }
        self.success = true;
        self.error = None;
        self
    }

    /// Mark as failed with a reason.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

// ────────────────────────────────────────────
// Esports game events (belief-model input)
// ────────────────────────────────────────────

/// Game event category. Each carries its own likelihood pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Kill,
    Dragon,
    Baron,
    Tower,
    Inhibitor,
    Roshan,
    /// Anything the parser could not classify. Has no likelihoods.
    #[serde(other)]
    Unknown,
}

/// Team credited with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Blue,
    Red,
    Radiant,
    Dire,
    Team1,
    Team2,
    #[serde(other)]
    Unknown,
}

impl Team {
    /// Whether the event counts in favour of side A (the modelled outcome).
    pub const fn favours_side_a(self) -> bool {
        matches!(self, Self::Blue | Self::Radiant | Self::Team1)
    }

    /// Lenient parse used by the game-data parser.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "blue" => Self::Blue,
            "red" => Self::Red,
            "radiant" => Self::Radiant,
            "dire" => Self::Dire,
            "team1" => Self::Team1,
            "team2" => Self::Team2,
            _ => Self::Unknown,
        }
    }
}

/// One discrete observation from the game feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub event_type: EventType,
    pub team: Team,
    pub timestamp: DateTime<Utc>,
    /// Deduplication key.
    pub event_id: String,
    /// Raw provider payload.
    pub details: serde_json::Value,
}

/// Supported esports titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Lol,
    Dota,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lol => write!(f, "lol"),
            Self::Dota => write!(f, "dota"),
        }
    }
}

/// Match followed by the esports variant of the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTarget {
    pub game: GameType,
    pub match_id: MatchId,
}

/// One point of the posterior history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityUpdate {
    pub posterior: f64,
    pub timestamp: DateTime<Utc>,
    /// Event that caused the update, if any.
    pub event_type: Option<EventType>,
    pub team: Option<Team>,
}

impl ProbabilityUpdate {
    /// History point without a causing event (priors, strategy mids).
    pub fn untagged(posterior: f64) -> Self {
        Self {
            posterior,
            timestamp: Utc::now(),
            event_type: None,
            team: None,
        }
    }
}

// ────────────────────────────────────────────
// Bot lifecycle
// ────────────────────────────────────────────

/// Lifecycle status of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotStatus {
    Idle,
    Starting,
    Running,
    Paused,
    Stopping,
    Stopped,
    Error,
}

impl BotStatus {
    /// `start()` is accepted from here.
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    /// A session is open (feed connected or connecting).
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "IDLE",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Market-data connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Reconnecting,
    Disconnected,
}

/// Snapshot of the controller state for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotState {
    pub status: BotStatus,
    pub connection: ConnectionStatus,
    pub error: Option<String>,
    pub dry_run: bool,
    /// Seconds spent in RUNNING during the current session.
    pub elapsed_seconds: u64,
    pub market_ticker: Option<MarketId>,
}

/// Caller-supplied trading parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub market_ticker: MarketId,
    /// Edge threshold in percent (5 = 0.05).
    pub edge_threshold_percent: f64,
    pub order_size: u32,
    pub max_position: i64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            market_ticker: String::new(),
            edge_threshold_percent: 5.0,
            order_size: 10,
            max_position: 100,
        }
    }
}

impl TradingConfig {
    /// Threshold as a probability fraction.
    pub fn edge_threshold(&self) -> f64 {
        self.edge_threshold_percent / 100.0
    }
}

/// Aggregated session statistics for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub pnl: f64,
    pub pnl_percent: f64,
    pub trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub win_rate: f64,
    pub model_probability: f64,
    pub model_probability_delta: f64,
    pub market_price: f64,
    pub yes_price: f64,
    pub no_price: f64,
    pub edge: f64,
    pub edge_threshold: f64,
    pub position: i64,
    pub exposure: f64,
    pub event_count: u64,
}

// ────────────────────────────────────────────
// Strategy selection
// ────────────────────────────────────────────

/// Available strategy implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    MarketMaker,
    Momentum,
}

impl StrategyKind {
    pub const ALL: [Self; 2] = [Self::MarketMaker, Self::Momentum];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarketMaker => "market-maker",
            Self::Momentum => "momentum",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown strategy: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mid_price() {
        let prices = MarketPrices::now(0.52, 0.50);
        assert!((prices.mid() - 0.51).abs() < 1e-12);
    }

    #[test]
    fn test_trade_side_signed_and_opposite() {
        assert_eq!(TradeSide::Buy.signed(7), 7);
        assert_eq!(TradeSide::Sell.signed(7), -7);
        assert_eq!(TradeSide::Buy.opposite(), TradeSide::Sell);
        assert_eq!(format!("{}", TradeSide::Sell), "SELL");
    }

    #[test]
    fn test_execution_accepted_keeps_local_id_without_broker_id() {
        let signal = TradeSignal {
            side: TradeSide::Buy,
            price: 0.4,
            size: 3,
            edge: 0.1,
        };
        let pending = TradeExecution::pending(&signal, true);
        let local_id = pending.id.clone();
        let done = pending.accepted(None);
        assert!(done.success);
        assert_eq!(done.id, local_id);

        let failed = TradeExecution::pending(&signal, false).failed("rejected");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("rejected"));
    }

    #[test]
    fn test_team_side_classification() {
        assert!(Team::Blue.favours_side_a());
        assert!(Team::Radiant.favours_side_a());
        assert!(Team::Team1.favours_side_a());
        assert!(!Team::Red.favours_side_a());
        assert!(!Team::Unknown.favours_side_a());
        assert_eq!(Team::from_label(" Radiant "), Team::Radiant);
    }

    #[test]
    fn test_strategy_kind_round_trip_names() {
        assert_eq!("momentum".parse::<StrategyKind>(), Ok(StrategyKind::Momentum));
        assert_eq!(StrategyKind::MarketMaker.to_string(), "market-maker");
        assert!("grid".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_status_start_points() {
        assert!(BotStatus::Idle.can_start());
        assert!(BotStatus::Stopped.can_start());
        assert!(!BotStatus::Error.can_start());
        assert!(!BotStatus::Running.can_start());
    }

    #[test]
    fn test_edge_threshold_fraction() {
        let cfg = TradingConfig::default();
        assert!((cfg.edge_threshold() - 0.05).abs() < 1e-12);
    }
}
