//! Event Bus - Synchronous Fan-out of Bot Events
//!
//! Listeners run in the emitting context, in registration order. Each call
//! is isolated: an `Err` or a panic from one listener is logged and the
//! remaining listeners still receive the event.
//!
//! Async consumers can take a `broadcast::Receiver` from [`EventBus::stream`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::domain::types::{
  BotState, GameEvent, MarketPrices, ProbabilityUpdate, TradeExecution, TradeSignal,
};

/// Capacity of the async stream bridge.
const STREAM_CAPACITY: usize = 1024;

/// Everything the controller publishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BotEvent {
  /// Status or connection changed.
  StateChanged(BotState),
  Prices(MarketPrices),
  /// Active strategy quotes after a tick.
  Quotes {
    bid: Option<f64>,
    ask: Option<f64>,
    /// Smoothed theoretical mid the quotes are built around.
    mid: f64,
    inventory: i64,
  },
  /// One order attempt, successful or not.
  Trade {
    signal: TradeSignal,
    execution: TradeExecution,
  },
  Probability(ProbabilityUpdate),
  GameEvent(GameEvent),
  FeedError { message: String, fatal: bool },
  /// The tracked match finished.
  MarketClosed { reason: String },
}

impl BotEvent {
  /// Short label used in logs and metrics.
  pub const fn kind(&self) -> &'static str {
    match self {
      Self::StateChanged(_) => "state_changed",
      Self::Prices(_) => "prices",
      Self::Quotes { .. } => "quotes",
      Self::Trade { .. } => "trade",
      Self::Probability(_) => "probability",
      Self::GameEvent(_) => "game_event",
      Self::FeedError { .. } => "feed_error",
      Self::MarketClosed { .. } => "market_closed",
    }
  }
}

type Listener = Arc<dyn Fn(&BotEvent) -> anyhow::Result<()> + Send + Sync>;

struct BusInner {
  listeners: RwLock<Vec<(u64, Listener)>>,
  next_id: AtomicU64,
  stream: OnceLock<broadcast::Sender<BotEvent>>,
}

/// Multi-consumer publish/subscribe for [`BotEvent`]s. Clones share listeners.
#[derive(Clone)]
pub struct EventBus {
  inner: Arc<BusInner>,
}

/// Handle returned by [`EventBus::subscribe`]. Dropping it keeps the
/// listener registered; call [`Unsubscribe::unsubscribe`] to remove it.
#[must_use = "call `unsubscribe()` to remove the listener"]
pub struct Unsubscribe {
  id: u64,
  bus: Weak<BusInner>,
}

impl Unsubscribe {
  /// Removes the listener. A no-op once the bus is gone.
  pub fn unsubscribe(self) {
    if let Some(inner) = self.bus.upgrade() {
      inner
        .listeners
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|(id, _)| *id != self.id);
    }
  }
}

impl EventBus {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(BusInner {
        listeners: RwLock::new(Vec::new()),
        next_id: AtomicU64::new(0),
        stream: OnceLock::new(),
      }),
    }
  }

  /// Registers a listener called for every subsequent event.
  pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
  where
    F: Fn(&BotEvent) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
    self
      .inner
      .listeners
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .push((id, Arc::new(listener)));
    Unsubscribe {
      id,
      bus: Arc::downgrade(&self.inner),
    }
  }

  pub fn listener_count(&self) -> usize {
    self
      .inner
      .listeners
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  /// Delivers `event` to every listener registered at call time.
  pub fn emit(&self, event: &BotEvent) {
    let snapshot: Vec<Listener> = self
      .inner
      .listeners
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(_, l)| Arc::clone(l))
      .collect();

    for listener in snapshot {
      match catch_unwind(AssertUnwindSafe(|| listener(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(event = event.kind(), error = %e, "Event listener failed"),
        Err(_) => error!(event = event.kind(), "Event listener panicked"),
      }
    }
  }

  /// Receiver for async consumers. Slow receivers observe `Lagged`.
  pub fn stream(&self) -> broadcast::Receiver<BotEvent> {
    self
      .inner
      .stream
      .get_or_init(|| {
        let (tx, _) = broadcast::channel(STREAM_CAPACITY);
        let forward = tx.clone();
        // no receivers is fine, the bridge stays registered
        let _bridge = self.subscribe(move |event| {
          let _ = forward.send(event.clone());
          Ok(())
        });
        tx
      })
      .subscribe()
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}
