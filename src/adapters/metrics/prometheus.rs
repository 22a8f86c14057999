//! Prometheus Metrics Registry - Trading Observability
//!
//! Fed from the bot event bus and exposed on `/metrics` for Grafana
//! dashboards. Covers ticks, order outcomes, the model posterior,
//! inventory, realized cash flow and feed health.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::domain::types::{BotStatus, ConnectionStatus, TradeSide};
use crate::usecases::BotEvent;

const ALL_STATUSES: [BotStatus; 7] = [
    BotStatus::Idle,
    BotStatus::Starting,
    BotStatus::Running,
    BotStatus::Paused,
    BotStatus::Stopping,
    BotStatus::Stopped,
    BotStatus::Error,
];

/// Centralized Prometheus metrics for the bot.
///
/// All metrics follow the naming convention `prediction_bot_*`.
pub struct MetricsRegistry {
    registry: Registry,
    /// Market ticks accepted while running.
    pub ticks: IntCounter,
    /// Order attempts by side and outcome (`filled` / `failed`).
    pub trades: IntCounterVec,
    /// Edge reported by each signal that reached the broker.
    pub signal_edge: Histogram,
    /// Latest model probability (strategy theoretical mid or posterior).
    pub posterior: Gauge,
    /// Signed contract inventory.
    pub inventory: IntGauge,
    /// Cash flow from successful fills in the current session.
    pub realized_pnl: Gauge,
    /// 1 = connected, 0 otherwise.
    pub feed_connected: IntGauge,
    /// Feed errors by severity.
    pub feed_errors: IntCounterVec,
    /// Accepted game events by type.
    pub game_events: IntCounterVec,
    /// One-hot bot status.
    pub bot_status: IntGaugeVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks = IntCounter::new("prediction_bot_ticks_total", "Market ticks processed")?;

        let trades = IntCounterVec::new(
            Opts::new("prediction_bot_trades_total", "Order attempts"),
            &["side", "outcome"],
        )?;

        let signal_edge = Histogram::with_opts(
            HistogramOpts::new("prediction_bot_signal_edge", "Edge per submitted signal")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;

        let posterior = Gauge::new(
            "prediction_bot_model_probability",
            "Latest model probability for the YES outcome",
        )?;

        let inventory = IntGauge::new("prediction_bot_inventory", "Signed contract inventory")?;

        let realized_pnl = Gauge::new(
            "prediction_bot_realized_pnl",
            "Cash flow from fills in the current session",
        )?;

        let feed_connected = IntGauge::new(
            "prediction_bot_feed_connected",
            "Feed connection status (1=connected, 0=otherwise)",
        )?;

        let feed_errors = IntCounterVec::new(
            Opts::new("prediction_bot_feed_errors_total", "Feed errors"),
            &["severity"],
        )?;

        let game_events = IntCounterVec::new(
            Opts::new("prediction_bot_game_events_total", "Game events applied to the model"),
            &["event_type"],
        )?;

        let bot_status = IntGaugeVec::new(
            Opts::new("prediction_bot_status", "Current lifecycle status (one-hot)"),
            &["status"],
        )?;

        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(trades.clone()))?;
        registry.register(Box::new(signal_edge.clone()))?;
        registry.register(Box::new(posterior.clone()))?;
        registry.register(Box::new(inventory.clone()))?;
        registry.register(Box::new(realized_pnl.clone()))?;
        registry.register(Box::new(feed_connected.clone()))?;
        registry.register(Box::new(feed_errors.clone()))?;
        registry.register(Box::new(game_events.clone()))?;
        registry.register(Box::new(bot_status.clone()))?;

        let metrics = Self {
            registry,
            ticks,
            trades,
            signal_edge,
            posterior,
            inventory,
            realized_pnl,
            feed_connected,
            feed_errors,
            game_events,
            bot_status,
        };
        metrics.set_status(BotStatus::Idle);
        Ok(metrics)
    }

    fn set_status(&self, current: BotStatus) {
        for status in ALL_STATUSES {
            self.bot_status
                .with_label_values(&[status.to_string().as_str()])
                .set(i64::from(status == current));
        }
    }

    /// Updates metrics from one bus event.
    pub fn observe(&self, event: &BotEvent) {
        match event {
            BotEvent::StateChanged(state) => {
                self.set_status(state.status);
                self.feed_connected
                    .set(i64::from(state.connection == ConnectionStatus::Connected));
                if state.status == BotStatus::Starting {
                    self.realized_pnl.set(0.0);
                    self.inventory.set(0);
                }
            }
            BotEvent::Prices(_) => self.ticks.inc(),
            BotEvent::Quotes { inventory, .. } => self.inventory.set(*inventory),
            BotEvent::Trade { signal, execution } => {
                let outcome = if execution.success { "filled" } else { "failed" };
                self.trades
                    .with_label_values(&[execution.side.to_string().as_str(), outcome])
                    .inc();
                self.signal_edge.observe(signal.edge);
                if execution.success {
                    let notional = execution.price * f64::from(execution.size);
                    match execution.side {
                        TradeSide::Buy => {
                            self.realized_pnl.sub(notional);
                            self.inventory.add(i64::from(execution.size));
                        }
                        TradeSide::Sell => {
                            self.realized_pnl.add(notional);
                            self.inventory.sub(i64::from(execution.size));
                        }
                    }
                }
            }
            BotEvent::Probability(update) => self.posterior.set(update.posterior),
            BotEvent::GameEvent(game_event) => {
                let label = serde_json::to_value(game_event.event_type)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_else(|| "unknown".to_string());
                self.game_events.with_label_values(&[label.as_str()]).inc();
            }
            BotEvent::FeedError { fatal, .. } => {
                let severity = if *fatal { "fatal" } else { "transient" };
                self.feed_errors.with_label_values(&[severity]).inc();
            }
            BotEvent::MarketClosed { .. } => {}
        }
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    metrics
                        .render()
                        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BotState, TradeExecution, TradeSignal};

    fn state(status: BotStatus, connection: ConnectionStatus) -> BotEvent {
        BotEvent::StateChanged(BotState {
            status,
            connection,
            error: None,
            dry_run: true,
            elapsed_seconds: 0,
            market_ticker: Some("KX".into()),
        })
    }

    #[test]
    fn test_status_is_one_hot() {
        let m = MetricsRegistry::new().unwrap();
        m.observe(&state(BotStatus::Running, ConnectionStatus::Connected));
        assert_eq!(m.bot_status.with_label_values(&["RUNNING"]).get(), 1);
        assert_eq!(m.bot_status.with_label_values(&["IDLE"]).get(), 0);
        assert_eq!(m.feed_connected.get(), 1);
    }

    #[test]
    fn test_trade_outcomes_and_cash_flow() {
        let m = MetricsRegistry::new().unwrap();
        let signal = TradeSignal {
            side: TradeSide::Buy,
            price: 0.40,
            size: 10,
            edge: 2.5,
        };
        let filled = TradeExecution::pending(&signal, true).accepted(None);
        let failed = TradeExecution::pending(&signal, true).failed("rejected");

        m.observe(&BotEvent::Trade {
            signal,
            execution: filled,
        });
        m.observe(&BotEvent::Trade {
            signal,
            execution: failed,
        });

        assert_eq!(m.trades.with_label_values(&["BUY", "filled"]).get(), 1);
        assert_eq!(m.trades.with_label_values(&["BUY", "failed"]).get(), 1);
        assert!((m.realized_pnl.get() + 4.0).abs() < 1e-9);
        assert_eq!(m.inventory.get(), 10);
    }

    #[test]
    fn test_render_contains_metric_names() {
        let m = MetricsRegistry::new().unwrap();
        m.observe(&BotEvent::FeedError {
            message: "down".into(),
            fatal: false,
        });
        let text = m.render().unwrap();
        assert!(text.contains("prediction_bot_feed_errors_total"));
        assert!(text.contains("prediction_bot_status"));
    }
}
