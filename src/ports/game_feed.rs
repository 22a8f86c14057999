//! Game Feed Port - Esports Match Data Interface
//!
//! Polled source of discrete game events for one match. The adapter
//! parses provider payloads into [`GameEvent`]s; deduplication happens in
//! the predictor, so returning the full event list on every poll is fine.

use async_trait::async_trait;

use crate::domain::types::{GameEvent, MatchTarget};

/// Result of one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSnapshot {
  /// Events seen so far, in provider order.
  pub events: Vec<GameEvent>,
  /// The match has finished; no further polls are needed.
  pub complete: bool,
}

/// Trait for esports data providers.
#[async_trait]
pub trait GameFeed: Send + Sync + 'static {
  /// Fetch the current event list for `target`.
  async fn poll(&self, target: &MatchTarget) -> anyhow::Result<MatchSnapshot>;
}
