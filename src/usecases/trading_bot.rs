//! Trading Bot - Lifecycle Controller
//!
//! Owns all mutable session state behind one async mutex and reacts to
//! three sources: lifecycle calls, market feed events and the esports
//! poll timer.
//!
//! Evaluation cycles (one tick or one poll, including the order they
//! place) are serialized by a separate cycle lock, so at most one order
//! is in flight per market. The state lock is released while the order is
//! outstanding; `stop()` can close the feed concurrently and any tick that
//! arrives after the status left RUNNING is dropped.
//!
//! State machine:
//! ```text
//! IDLE/STOPPED --start--> STARTING --ok--> RUNNING <--pause/resume--> PAUSED
//!                             \--fail--> ERROR
//! RUNNING/PAUSED --stop/flatten--> STOPPING --> STOPPED
//! any --reset--> IDLE
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use super::error::BotError;
use super::events::{BotEvent, EventBus, Unsubscribe};
use crate::config::AppConfig;
use crate::domain::evaluator::TradeEvaluator;
use crate::domain::predictor::{BayesianPredictor, DEFAULT_PRIOR};
use crate::domain::strategy::{
  StrategyOverrides, StrategyState, StrategyTunables, TradingStrategy, available_strategies,
};
use crate::domain::types::{
  BotState, BotStatus, ConnectionStatus, GameEvent, MarketId, MarketPrices, MatchTarget,
  ProbabilityUpdate, Stats, StrategyKind, TradeExecution, TradeSide, TradeSignal, TradingConfig,
};
use crate::ports::{
  FeedEvent, GameFeed, MarketFeed, MarketTick, MatchSnapshot, OrderExecution, PriceSource,
};

/// Controller settings, usually taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct BotSettings {
  pub strategy: StrategyKind,
  pub tunables: StrategyTunables,
  pub trading: TradingConfig,
  pub dry_run: bool,
  /// Pause between closing the feed and reporting STOPPED.
  pub shutdown_grace: Duration,
  pub poll_interval: Duration,
}

impl BotSettings {
  pub fn from_config(config: &AppConfig) -> Self {
    Self {
      strategy: config.bot.strategy,
      tunables: config.tunables(),
      trading: config.trading.clone(),
      dry_run: config.bot.dry_run,
      shutdown_grace: Duration::from_millis(config.bot.shutdown_grace_ms),
      poll_interval: Duration::from_millis(config.esports.poll_interval_ms),
    }
  }
}

impl Default for BotSettings {
  fn default() -> Self {
    Self::from_config(&AppConfig::default())
  }
}

/// External collaborators.
#[derive(Clone)]
pub struct BotPorts {
  pub feed: Arc<dyn MarketFeed>,
  pub orders: Arc<dyn OrderExecution>,
  pub prices: Arc<dyn PriceSource>,
  /// Required only for sessions that track a match.
  pub games: Option<Arc<dyn GameFeed>>,
}

/// Arguments of [`TradingBot::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
  pub market_ticker: MarketId,
  /// Enables esports mode: the Bayesian model drives the decisions.
  pub match_target: Option<MatchTarget>,
  /// Overrides the current dry-run flag when set.
  pub dry_run: Option<bool>,
}

impl StartRequest {
  pub fn market(ticker: impl Into<MarketId>) -> Self {
    Self {
      market_ticker: ticker.into(),
      match_target: None,
      dry_run: None,
    }
  }

  #[must_use]
  pub fn with_match(mut self, target: MatchTarget) -> Self {
    self.match_target = Some(target);
    self
  }

  #[must_use]
  pub fn dry_run(mut self, dry_run: bool) -> Self {
    self.dry_run = Some(dry_run);
    self
  }
}

/// Elapsed time that only advances while RUNNING.
#[derive(Debug, Default)]
struct RunClock {
  accumulated: Duration,
  running_since: Option<Instant>,
}

impl RunClock {
  fn start(&mut self) {
    if self.running_since.is_none() {
      self.running_since = Some(Instant::now());
    }
  }

  fn pause(&mut self) {
    if let Some(since) = self.running_since.take() {
      self.accumulated += since.elapsed();
    }
  }

  fn reset(&mut self) {
    *self = Self::default();
  }

  fn elapsed(&self) -> Duration {
    self.accumulated + self.running_since.map_or(Duration::ZERO, |since| since.elapsed())
  }
}

/// Maps the trading section onto strategy tunables.
pub fn trading_overrides(config: &TradingConfig) -> StrategyOverrides {
  StrategyOverrides {
    order_size: Some(config.order_size),
    max_inventory: Some(config.max_position),
    min_edge_bps: Some(config.edge_threshold_percent * 10.0),
    ..StrategyOverrides::default()
  }
}

/// Wins and losses among successful executions. A SELL above or a BUY
/// below the mean successful fill price is a win.
fn win_loss(trades: &[TradeExecution]) -> (usize, usize) {
  let filled: Vec<&TradeExecution> = trades.iter().filter(|t| t.success).collect();
  if filled.is_empty() {
    return (0, 0);
  }
  let avg = filled.iter().map(|t| t.price).sum::<f64>() / filled.len() as f64;
  let wins = filled
    .iter()
    .filter(|t| match t.side {
      TradeSide::Sell => t.price > avg,
      TradeSide::Buy => t.price < avg,
    })
    .count();
  (wins, filled.len() - wins)
}

/// Handles owned by a live session.
struct Session {
  shutdown_tx: broadcast::Sender<()>,
  market_ticker: MarketId,
}

/// Order decided under the state lock, placed after releasing it.
struct PendingOrder {
  session_id: u64,
  signal: TradeSignal,
  ticker: MarketId,
  simulated: bool,
}

struct BotCore {
  status: BotStatus,
  connection: ConnectionStatus,
  error: Option<String>,
  /// Flag for the next session.
  dry_run: bool,
  /// Flag the current session was started with.
  session_dry_run: bool,
  session_id: u64,
  market_ticker: Option<MarketId>,
  match_target: Option<MatchTarget>,
  clock: RunClock,
  config: TradingConfig,
  tunables: StrategyTunables,
  strategy: Box<dyn TradingStrategy>,
  predictor: BayesianPredictor,
  evaluator: TradeEvaluator,
  prices: Option<MarketPrices>,
  events: Vec<GameEvent>,
  trades: Vec<TradeExecution>,
  history: Vec<ProbabilityUpdate>,
  session: Option<Session>,
}

impl BotCore {
  fn new(settings: &BotSettings) -> Self {
    let mut strategy = settings.tunables.build(settings.strategy);
    strategy.update_config(&trading_overrides(&settings.trading));
    Self {
      status: BotStatus::Idle,
      connection: ConnectionStatus::Disconnected,
      error: None,
      dry_run: settings.dry_run,
      session_dry_run: settings.dry_run,
      session_id: 0,
      market_ticker: None,
      match_target: None,
      clock: RunClock::default(),
      config: settings.trading.clone(),
      tunables: settings.tunables.clone(),
      strategy,
      predictor: BayesianPredictor::default(),
      evaluator: TradeEvaluator::new(settings.trading.edge_threshold()),
      prices: None,
      events: Vec::new(),
      trades: Vec::new(),
      history: Vec::new(),
      session: None,
    }
  }

  fn snapshot(&self) -> BotState {
    BotState {
      status: self.status,
      connection: self.connection,
      error: self.error.clone(),
      dry_run: self.dry_run,
      elapsed_seconds: self.clock.elapsed().as_secs(),
      market_ticker: self.market_ticker.clone(),
    }
  }

  fn is_current(&self, session_id: u64) -> bool {
    self.session_id == session_id
  }

  fn accepts_ticks(&self, session_id: u64) -> bool {
    self.is_current(session_id) && self.status == BotStatus::Running
  }

  fn clear_logs(&mut self) {
    self.events.clear();
    self.trades.clear();
    self.history.clear();
    self.prices = None;
  }

  fn apply_trading_config(&mut self) {
    self.strategy.update_config(&trading_overrides(&self.config));
    self.evaluator = TradeEvaluator::new(self.config.edge_threshold());
  }

  /// Fresh strategy, model and logs for a new session.
  fn begin_session(&mut self, ticker: MarketId, target: Option<MatchTarget>) -> u64 {
    self.session_id += 1;
    self.session_dry_run = self.dry_run;
    self.error = None;
    self.clear_logs();
    self.strategy.reset();
    self.apply_trading_config();
    self.predictor.reset(DEFAULT_PRIOR);
    if target.is_some() {
      self.history.push(ProbabilityUpdate::untagged(DEFAULT_PRIOR));
    }
    self.market_ticker = Some(ticker);
    self.match_target = target;
    self.clock.reset();
    self.session_id
  }

  fn stats(&self) -> Stats {
    let state = self.strategy.state();
    let yes_price = self.prices.map_or(0.5, |p| p.yes_price);
    let no_price = self.prices.map_or(0.5, |p| p.no_price);
    let (win_count, loss_count) = win_loss(&self.trades);
    let filled = win_count + loss_count;

    let pnl = state.realized_pnl + self.strategy.unrealized_pnl(yes_price);
    let exposure = state.inventory.unsigned_abs() as f64 * yes_price;

    let (model_probability, model_probability_delta) = if self.match_target.is_some() {
      let posterior = self.predictor.posterior();
      let mid = self.prices.map_or(state.mid_price, |p| p.mid());
      (posterior, posterior - mid)
    } else {
      (state.theoretical_mid, state.theoretical_mid - state.mid_price)
    };

    Stats {
      pnl,
      pnl_percent: if exposure > 0.0 { pnl / exposure * 100.0 } else { 0.0 },
      trade_count: self.trades.len(),
      win_count,
      loss_count,
      win_rate: if filled > 0 { win_count as f64 / filled as f64 } else { 0.0 },
      model_probability,
      model_probability_delta,
      market_price: yes_price,
      yes_price,
      no_price,
      edge: match (state.bid_price, state.ask_price) {
        (Some(bid), Some(ask)) => (ask - bid) / 2.0,
        _ => 0.0,
      },
      edge_threshold: self.config.edge_threshold(),
      position: state.inventory,
      exposure,
      event_count: state.fill_count,
    }
  }
}

struct Inner {
  core: Mutex<BotCore>,
  /// Held for a whole evaluate-and-place cycle.
  cycle: Mutex<()>,
  bus: EventBus,
  ports: BotPorts,
  shutdown_grace: Duration,
  poll_interval: Duration,
}

/// Cloneable handle to one bot instance.
#[derive(Clone)]
pub struct TradingBot {
  inner: Arc<Inner>,
}

impl TradingBot {
  pub fn new(settings: BotSettings, ports: BotPorts) -> Self {
    Self {
      inner: Arc::new(Inner {
        core: Mutex::new(BotCore::new(&settings)),
        cycle: Mutex::new(()),
        bus: EventBus::new(),
        ports,
        shutdown_grace: settings.shutdown_grace,
        poll_interval: settings.poll_interval,
      }),
    }
  }

  fn emit(&self, event: BotEvent) {
    self.inner.bus.emit(&event);
  }

  fn publish_state(&self, core: &BotCore) {
    self.emit(BotEvent::StateChanged(core.snapshot()));
  }

  // ── Lifecycle ──

  /// Opens the feed and begins trading `request.market_ticker`.
  ///
  /// Valid from IDLE or STOPPED. On connection failure the bot lands in
  /// ERROR with the message captured and a fatal feed error emitted.
  #[instrument(skip(self), fields(ticker = %request.market_ticker))]
  pub async fn start(&self, request: StartRequest) -> Result<(), BotError> {
    if request.market_ticker.trim().is_empty() {
      return Err(BotError::InvalidConfig("market ticker must not be empty".into()));
    }
    if request.match_target.is_some() && self.inner.ports.games.is_none() {
      return Err(BotError::InvalidConfig("no game feed configured for match tracking".into()));
    }

    let (session_id, simulated) = {
      let mut core = self.inner.core.lock().await;
      if !core.status.can_start() {
        return Err(BotError::InvalidTransition {
          from: core.status,
          action: "start",
        });
      }
      if let Some(dry_run) = request.dry_run {
        core.dry_run = dry_run;
      }
      let session_id =
        core.begin_session(request.market_ticker.clone(), request.match_target.clone());
      core.status = BotStatus::Starting;
      info!(dry_run = core.session_dry_run, strategy = %core.strategy.kind(), "Starting bot");
      self.publish_state(&core);
      (session_id, core.session_dry_run)
    };

    // Receiver first so the initial Connected event is not missed.
    let feed_rx = self.inner.ports.feed.events();
    let feed = &self.inner.ports.feed;
    let connected = match feed.connect(simulated).await {
      Ok(()) => feed.subscribe(&request.market_ticker).await,
      Err(e) => Err(e),
    };

    let mut core = self.inner.core.lock().await;
    if !core.is_current(session_id) || core.status != BotStatus::Starting {
      drop(core);
      feed.disconnect().await;
      return Err(BotError::Startup("start superseded by reset".into()));
    }

    if let Err(e) = connected {
      let message = format!("{e:#}");
      error!(error = %message, "Feed connection failed, bot in ERROR");
      core.status = BotStatus::Error;
      core.connection = ConnectionStatus::Disconnected;
      core.error = Some(message.clone());
      self.publish_state(&core);
      self.emit(BotEvent::FeedError {
        message: message.clone(),
        fatal: true,
      });
      drop(core);
      feed.disconnect().await;
      return Err(BotError::Startup(message));
    }

    let (shutdown_tx, _) = broadcast::channel(1);
    tokio::spawn(
      self
        .clone()
        .pump_feed(feed_rx, shutdown_tx.subscribe(), session_id),
    );
    if let Some(target) = core.match_target.clone() {
      tokio::spawn(
        self
          .clone()
          .poll_match(target, shutdown_tx.subscribe(), session_id),
      );
    }
    core.session = Some(Session {
      shutdown_tx,
      market_ticker: request.market_ticker,
    });

    core.connection = ConnectionStatus::Connected;
    core.status = BotStatus::Running;
    core.clock.start();
    info!(esports = core.match_target.is_some(), "Bot running");
    self.publish_state(&core);
    Ok(())
  }

  /// RUNNING → PAUSED. Ticks are dropped and polling halts; the feed stays open.
  #[instrument(skip(self))]
  pub async fn pause(&self) -> Result<(), BotError> {
    let mut core = self.inner.core.lock().await;
    if core.status != BotStatus::Running {
      return Err(BotError::InvalidTransition {
        from: core.status,
        action: "pause",
      });
    }
    core.status = BotStatus::Paused;
    core.clock.pause();
    info!("Bot paused");
    self.publish_state(&core);
    Ok(())
  }

  /// PAUSED → RUNNING.
  #[instrument(skip(self))]
  pub async fn resume(&self) -> Result<(), BotError> {
    let mut core = self.inner.core.lock().await;
    if core.status != BotStatus::Paused {
      return Err(BotError::InvalidTransition {
        from: core.status,
        action: "resume",
      });
    }
    core.status = BotStatus::Running;
    core.clock.start();
    info!("Bot resumed");
    self.publish_state(&core);
    Ok(())
  }

  /// Closes the feed and waits the grace period before reporting STOPPED.
  #[instrument(skip(self))]
  pub async fn stop(&self) -> Result<(), BotError> {
    let session = self.begin_stop("stop").await?;
    self.close_session(session).await;
    self.finish_stop().await;
    Ok(())
  }

  /// Like [`stop`](Self::stop), but first submits one order closing the
  /// whole inventory at the current YES price.
  #[instrument(skip(self))]
  pub async fn flatten_and_stop(&self) -> Result<(), BotError> {
    let session = self.begin_stop("flatten").await?;
    self.close_session(session).await;
    self.flatten_inventory().await;
    self.finish_stop().await;
    Ok(())
  }

  /// Back to IDLE from any state, dropping the session and its logs.
  #[instrument(skip(self))]
  pub async fn reset(&self) {
    let session = {
      let mut core = self.inner.core.lock().await;
      let session = core.session.take();
      core.session_id += 1;
      core.status = BotStatus::Idle;
      core.connection = ConnectionStatus::Disconnected;
      core.error = None;
      core.market_ticker = None;
      core.match_target = None;
      core.clock.reset();
      core.clear_logs();
      core.strategy.reset();
      core.predictor.reset(DEFAULT_PRIOR);
      info!("Bot reset");
      self.publish_state(&core);
      session
    };
    self.close_session(session).await;
  }

  async fn begin_stop(&self, action: &'static str) -> Result<Option<Session>, BotError> {
    let mut core = self.inner.core.lock().await;
    if !core.status.is_active() {
      return Err(BotError::InvalidTransition {
        from: core.status,
        action,
      });
    }
    core.status = BotStatus::Stopping;
    core.clock.pause();
    info!(action, "Stopping bot");
    self.publish_state(&core);
    Ok(core.session.take())
  }

  async fn close_session(&self, session: Option<Session>) {
    let feed = &self.inner.ports.feed;
    if let Some(session) = session {
      let _ = session.shutdown_tx.send(());
      if let Err(e) = feed.unsubscribe(&session.market_ticker).await {
        debug!(error = %e, "Unsubscribe failed during shutdown");
      }
    }
    feed.disconnect().await;
  }

  async fn finish_stop(&self) {
    tokio::time::sleep(self.inner.shutdown_grace).await;
    let mut core = self.inner.core.lock().await;
    if core.status != BotStatus::Stopping {
      return;
    }
    core.connection = ConnectionStatus::Disconnected;
    core.status = BotStatus::Stopped;
    core.clock.reset();
    info!(trades = core.trades.len(), "Bot stopped");
    self.publish_state(&core);
  }

  async fn flatten_inventory(&self) {
    // wait for any in-flight cycle so the inventory is settled
    let _cycle = self.inner.cycle.lock().await;
    let (session_id, inventory, ticker, simulated) = {
      let core = self.inner.core.lock().await;
      if core.status != BotStatus::Stopping {
        return;
      }
      (
        core.session_id,
        core.strategy.state().inventory,
        core.market_ticker.clone(),
        core.session_dry_run,
      )
    };
    let Some(ticker) = ticker else {
      return;
    };
    if inventory == 0 {
      debug!("Flat book, nothing to close");
      return;
    }

    let Some(prices) = self.inner.ports.prices.fetch_prices(&ticker, simulated).await else {
      warn!(inventory, "No price snapshot, flatten order skipped");
      return;
    };

    let held = if inventory > 0 { TradeSide::Buy } else { TradeSide::Sell };
    let signal = TradeSignal {
      side: held.opposite(),
      price: prices.yes_price,
      size: u32::try_from(inventory.unsigned_abs()).unwrap_or(u32::MAX),
      edge: 0.0,
    };
    info!(side = %signal.side, size = signal.size, price = signal.price, "Flattening position");
    self
      .place_and_record(PendingOrder {
        session_id,
        signal,
        ticker,
        simulated,
      })
      .await;
  }

  // ── Settings ──

  /// Pure flag flip; applies to the next `start()`.
  pub async fn set_dry_run(&self, dry_run: bool) {
    let mut core = self.inner.core.lock().await;
    core.dry_run = dry_run;
    info!(dry_run, "Dry-run flag changed");
    self.publish_state(&core);
  }

  /// Replaces the strategy. Only while IDLE or STOPPED.
  pub async fn set_strategy(&self, kind: StrategyKind) -> Result<(), BotError> {
    let mut core = self.inner.core.lock().await;
    if !core.status.can_start() {
      return Err(BotError::BotRunning {
        status: core.status,
      });
    }
    core.strategy = core.tunables.build(kind);
    core.apply_trading_config();
    info!(strategy = %kind, "Strategy changed");
    Ok(())
  }

  /// Stores the trading section and pushes it into the active strategy.
  pub async fn set_config(&self, config: TradingConfig) -> Result<(), BotError> {
    if config.order_size == 0 {
      return Err(BotError::InvalidConfig("order_size must be > 0".into()));
    }
    if config.max_position <= 0 {
      return Err(BotError::InvalidConfig("max_position must be > 0".into()));
    }
    if !(config.edge_threshold_percent > 0.0 && config.edge_threshold_percent < 100.0) {
      return Err(BotError::InvalidConfig(
        "edge_threshold_percent must be in (0, 100)".into(),
      ));
    }
    let mut core = self.inner.core.lock().await;
    core.config = config;
    core.apply_trading_config();
    debug!(config = ?core.config, "Trading config applied");
    Ok(())
  }

  /// Partial tunable update for the active strategy.
  pub async fn set_strategy_config(&self, overrides: StrategyOverrides) {
    let mut core = self.inner.core.lock().await;
    core.strategy.update_config(&overrides);
  }

  /// Applies a reloaded configuration file: strategy tunables first, then
  /// the trading section on top.
  pub async fn apply_reload(&self, config: &AppConfig) -> Result<(), BotError> {
    {
      let mut core = self.inner.core.lock().await;
      core.tunables = config.tunables();
      let overrides = core.tunables.overrides_for(core.strategy.kind());
      core.strategy.update_config(&overrides);
    }
    self.set_config(config.trading.clone()).await
  }

  // ── Queries (all return copies) ──

  pub async fn get_state(&self) -> BotState {
    self.inner.core.lock().await.snapshot()
  }

  pub async fn get_stats(&self) -> Stats {
    self.inner.core.lock().await.stats()
  }

  pub async fn get_config(&self) -> TradingConfig {
    self.inner.core.lock().await.config.clone()
  }

  pub async fn get_strategy_name(&self) -> StrategyKind {
    self.inner.core.lock().await.strategy.kind()
  }

  pub async fn get_strategy_state(&self) -> StrategyState {
    self.inner.core.lock().await.strategy.state()
  }

  pub fn available_strategies(&self) -> Vec<StrategyKind> {
    available_strategies()
  }

  pub async fn get_events(&self) -> Vec<GameEvent> {
    self.inner.core.lock().await.events.clone()
  }

  pub async fn get_trades(&self) -> Vec<TradeExecution> {
    self.inner.core.lock().await.trades.clone()
  }

  pub async fn get_probability_history(&self) -> Vec<ProbabilityUpdate> {
    self.inner.core.lock().await.history.clone()
  }

  pub async fn get_market_prices(&self) -> Option<MarketPrices> {
    self.inner.core.lock().await.prices
  }

  /// Registers a synchronous listener for every bot event.
  pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
  where
    F: Fn(&BotEvent) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.inner.bus.subscribe(listener)
  }

  /// Async receiver of bot events.
  pub fn stream(&self) -> broadcast::Receiver<BotEvent> {
    self.inner.bus.stream()
  }

  // ── Session tasks ──

  async fn pump_feed(
    self,
    mut feed_rx: broadcast::Receiver<FeedEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
    session_id: u64,
  ) {
    loop {
      tokio::select! {
        biased;

        _ = shutdown_rx.recv() => break,

        event = feed_rx.recv() => match event {
          Ok(FeedEvent::Quote(tick)) => self.on_tick(session_id, tick).await,
          Ok(FeedEvent::Connected) => {
            self.on_connection(session_id, ConnectionStatus::Connected).await;
          }
          Ok(FeedEvent::Reconnecting { attempt, delay }) => {
            info!(attempt, delay_ms = delay.as_millis() as u64, "Feed reconnecting");
            self.on_connection(session_id, ConnectionStatus::Reconnecting).await;
          }
          Ok(FeedEvent::Disconnected) => {
            self.on_connection(session_id, ConnectionStatus::Disconnected).await;
          }
          Ok(FeedEvent::Error(message)) => self.on_feed_error(session_id, message, false).await,
          Ok(FeedEvent::Fatal(message)) => {
            self.on_connection(session_id, ConnectionStatus::Disconnected).await;
            self.on_feed_error(session_id, message, true).await;
          }
          Err(RecvError::Lagged(skipped)) => warn!(skipped, "Feed consumer lagged"),
          Err(RecvError::Closed) => break,
        },
      }
    }
    debug!(session_id, "Feed pump stopped");
  }

  async fn poll_match(
    self,
    target: MatchTarget,
    mut shutdown_rx: broadcast::Receiver<()>,
    session_id: u64,
  ) {
    let Some(games) = self.inner.ports.games.clone() else {
      return;
    };
    let mut interval = tokio::time::interval(self.inner.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
      tokio::select! {
        biased;

        _ = shutdown_rx.recv() => break,

        _ = interval.tick() => {
          if !self.inner.core.lock().await.accepts_ticks(session_id) {
            continue;
          }
          match games.poll(&target).await {
            Ok(snapshot) => {
              if self.on_snapshot(session_id, snapshot).await.is_break() {
                break;
              }
            }
            Err(e) => self.on_feed_error(session_id, format!("{e:#}"), false).await,
          }
        }
      }
    }
    debug!(session_id, match_id = %target.match_id, "Match polling stopped");
  }

  async fn on_connection(&self, session_id: u64, connection: ConnectionStatus) {
    let mut core = self.inner.core.lock().await;
    if !core.is_current(session_id) || !core.status.is_active() {
      return;
    }
    if core.connection != connection {
      core.connection = connection;
      self.publish_state(&core);
    }
  }

  async fn on_feed_error(&self, session_id: u64, message: String, fatal: bool) {
    let mut core = self.inner.core.lock().await;
    if !core.is_current(session_id) {
      return;
    }
    if fatal {
      error!(error = %message, "Fatal feed error");
      core.error = Some(message.clone());
    } else {
      warn!(error = %message, "Feed error");
    }
    self.emit(BotEvent::FeedError { message, fatal });
  }

  /// One market tick: prices, strategy quotes, then at most one order.
  async fn on_tick(&self, session_id: u64, tick: MarketTick) {
    let _cycle = self.inner.cycle.lock().await;
    let pending = {
      let mut core = self.inner.core.lock().await;
      if !core.accepts_ticks(session_id)
        || core.market_ticker.as_deref() != Some(tick.market_id.as_str())
      {
        return;
      }

      let prices = MarketPrices::now(tick.yes_ask, tick.no_ask);
      core.prices = Some(prices);
      self.emit(BotEvent::Prices(prices));

      if core.match_target.is_some() {
        return;
      }

      let signal = core.strategy.evaluate_trade(tick.yes_ask, tick.no_ask);
      let state = core.strategy.state();
      self.emit(BotEvent::Quotes {
        bid: state.bid_price,
        ask: state.ask_price,
        mid: state.theoretical_mid,
        inventory: state.inventory,
      });

      let point = ProbabilityUpdate::untagged(state.theoretical_mid);
      core.history.push(point.clone());
      self.emit(BotEvent::Probability(point));

      let Some(signal) = signal else {
        return;
      };
      PendingOrder {
        session_id,
        signal,
        ticker: tick.market_id,
        simulated: core.session_dry_run,
      }
    };

    self.place_and_record(pending).await;
  }

  /// One poll result: feed the model, then evaluate if the posterior moved.
  async fn on_snapshot(&self, session_id: u64, snapshot: MatchSnapshot) -> ControlFlow<()> {
    let _cycle = self.inner.cycle.lock().await;
    let (posterior, prices, evaluator, order_size, inventory, max_position, ticker, simulated) = {
      let mut core = self.inner.core.lock().await;
      if !core.accepts_ticks(session_id) {
        return ControlFlow::Continue(());
      }

      let mut moved = false;
      for event in snapshot.events {
        if !core.predictor.update(&event) {
          continue;
        }
        moved = true;
        let point = core.predictor.latest().cloned();
        core.events.push(event.clone());
        self.emit(BotEvent::GameEvent(event));
        if let Some(point) = point {
          core.history.push(point.clone());
          self.emit(BotEvent::Probability(point));
        }
      }

      if snapshot.complete {
        info!(posterior = core.predictor.posterior(), "Match complete");
        self.emit(BotEvent::MarketClosed {
          reason: "match complete".to_string(),
        });
        return ControlFlow::Break(());
      }
      let Some(ticker) = core.market_ticker.clone() else {
        return ControlFlow::Continue(());
      };
      if !moved {
        return ControlFlow::Continue(());
      }
      (
        core.predictor.posterior(),
        core.prices,
        core.evaluator,
        core.config.order_size,
        core.strategy.state().inventory,
        core.config.max_position,
        ticker,
        core.session_dry_run,
      )
    };

    let prices = match prices {
      Some(p) => p,
      None => {
        let Some(p) = self.inner.ports.prices.fetch_prices(&ticker, simulated).await else {
          debug!("No market prices yet, evaluation skipped");
          return ControlFlow::Continue(());
        };
        let mut core = self.inner.core.lock().await;
        if !core.accepts_ticks(session_id) {
          return ControlFlow::Continue(());
        }
        core.prices = Some(p);
        self.emit(BotEvent::Prices(p));
        p
      }
    };

    let Some(signal) = evaluator.evaluate(posterior, &prices, order_size) else {
      return ControlFlow::Continue(());
    };
    if (inventory + signal.side.signed(signal.size)).abs() > max_position {
      debug!(inventory, max_position, "Position limit reached, signal skipped");
      return ControlFlow::Continue(());
    }

    self
      .place_and_record(PendingOrder {
        session_id,
        signal,
        ticker,
        simulated,
      })
      .await;
    ControlFlow::Continue(())
  }

  /// Places the order without holding the state lock, then books it.
  async fn place_and_record(&self, order: PendingOrder) {
    let PendingOrder {
      session_id,
      signal,
      ticker,
      simulated,
    } = order;

    let execution = self
      .inner
      .ports
      .orders
      .place_order(&signal, &ticker, simulated)
      .await;

    let mut core = self.inner.core.lock().await;
    if !core.is_current(session_id) {
      debug!(execution_id = %execution.id, "Execution from a finished session dropped");
      return;
    }
    if execution.success {
      core.strategy.on_fill(signal.side, execution.price, execution.size);
    } else {
      warn!(
        side = %signal.side,
        error = execution.error.as_deref().unwrap_or("unknown"),
        "Order failed"
      );
    }
    core.trades.push(execution.clone());
    self.emit(BotEvent::Trade { signal, execution });
  }
}
