//! Market Feed Port - Real-time Market Data Interface
//!
//! Defines the trait for receiving live YES/NO quotes from a prediction
//! market venue (e.g., the Kalshi WebSocket). Transport, reconnection and
//! wire decoding stay in the adapter; the controller only sees
//! [`FeedEvent`]s on a broadcast channel.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::types::MarketId;

/// Top-of-book quote for one market, in dollars.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketTick {
  /// Market ticker the quote belongs to.
  pub market_id: MarketId,
  /// Best YES ask.
  pub yes_ask: f64,
  /// Best NO ask.
  pub no_ask: f64,
}

/// Everything a feed reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
  /// New top-of-book quote.
  Quote(MarketTick),
  /// Socket open and subscriptions sent.
  Connected,
  /// Socket closed on request.
  Disconnected,
  /// Connection dropped; reconnect attempt `attempt` after `delay`.
  Reconnecting {
    attempt: u32,
    delay: Duration,
  },
  /// Recoverable transport or protocol error.
  Error(String),
  /// Reconnect attempts exhausted. The feed is dead until `connect` is
  /// called again.
  Fatal(String),
}

/// Trait for market data feed providers.
///
/// Implementors own one connection and broadcast [`FeedEvent`]s to every
/// receiver obtained from [`MarketFeed::events`]. `subscribe` before
/// `connect` must be remembered and sent once the socket opens.
#[async_trait]
pub trait MarketFeed: Send + Sync + 'static {
  /// Open the connection. `simulated` selects the demo venue.
  async fn connect(&self, simulated: bool) -> anyhow::Result<()>;

  /// Start streaming quotes for `market_id`.
  async fn subscribe(&self, market_id: &MarketId) -> anyhow::Result<()>;

  /// Stop streaming quotes for `market_id`.
  async fn unsubscribe(&self, market_id: &MarketId) -> anyhow::Result<()>;

  /// Close the connection. No reconnect follows.
  async fn disconnect(&self);

  /// Fresh receiver for feed events.
  fn events(&self) -> broadcast::Receiver<FeedEvent>;
}
