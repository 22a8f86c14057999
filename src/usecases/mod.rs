//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the bot's workflows.
//!
//! Use cases:
//! - `TradingBot`: Lifecycle state machine, tick and poll processing
//! - `EventBus`: Synchronous fan-out of `BotEvent`s to listeners

pub mod error;
pub mod events;
pub mod trading_bot;

pub use error::BotError;
pub use events::{BotEvent, EventBus, Unsubscribe};
pub use trading_bot::{BotPorts, BotSettings, StartRequest, TradingBot, trading_overrides};
