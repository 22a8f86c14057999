//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `MarketFeed`: Real-time market data streaming
//! - `OrderExecution` / `PriceSource`: Order placement and price snapshots
//! - `GameFeed`: Esports match events for the belief model

pub mod execution;
pub mod game_feed;
pub mod market_feed;

pub use execution::{OrderExecution, PriceSource};
pub use game_feed::{GameFeed, MatchSnapshot};
pub use market_feed::{FeedEvent, MarketFeed, MarketTick};
