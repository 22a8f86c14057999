//! Domain layer - Core decision logic and models.
//!
//! Pure logic for the prediction-market bot: the Bayesian event model, the
//! edge evaluator and the pluggable trading strategies.
//! No I/O here (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod evaluator;
pub mod predictor;
pub mod strategy;
pub mod types;

// Re-export core types for convenience
pub use evaluator::{TradeEvaluator, evaluate_trade};
pub use predictor::{BayesianPredictor, EventLikelihoods, bayes_update};
pub use strategy::{
    MarketMakerConfig, MarketMakerStrategy, MomentumConfig, MomentumStrategy, StrategyOverrides,
    StrategyState, StrategyTunables, TradingStrategy, available_strategies, create_strategy,
};
pub use types::{
    BotState, BotStatus, ConnectionStatus, EventType, GameEvent, GameType, MarketId,
    MarketPrices, MatchId, MatchTarget, ProbabilityUpdate, Stats, StrategyKind, Team,
    TradeExecution, TradeSide, TradeSignal, TradingConfig,
};
