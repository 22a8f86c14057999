//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready endpoints via axum 0.7 for Docker
//! health checks and monitoring. Readiness follows the bot's
//! lifecycle: an active session with a connected feed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::domain::types::ConnectionStatus;
use crate::usecases::BotEvent;

/// Shared health state updated from bot events.
#[derive(Debug, Default)]
pub struct HealthState {
    /// RUNNING or PAUSED.
    pub session_active: AtomicBool,
    pub feed_connected: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks lifecycle and connection changes; other events are ignored.
    pub fn observe(&self, event: &BotEvent) {
        if let BotEvent::StateChanged(state) = event {
            self.session_active
                .store(state.status.is_active(), Ordering::Relaxed);
            self.feed_connected.store(
                state.connection == ConnectionStatus::Connected,
                Ordering::Relaxed,
            );
        }
    }

    /// Check if the bot is trading on a live feed.
    pub fn is_ready(&self) -> bool {
        self.session_active.load(Ordering::Relaxed) && self.feed_connected.load(Ordering::Relaxed)
    }
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
    state: Arc<HealthState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Serve until shutdown is broadcast.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .with_state(Arc::clone(&self.state));

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
        if state.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BotState, BotStatus};

    fn changed(status: BotStatus, connection: ConnectionStatus) -> BotEvent {
        BotEvent::StateChanged(BotState {
            status,
            connection,
            error: None,
            dry_run: true,
            elapsed_seconds: 0,
            market_ticker: None,
        })
    }

    #[test]
    fn test_ready_only_when_active_and_connected() {
        let health = HealthState::new();
        assert!(!health.is_ready());

        health.observe(&changed(BotStatus::Running, ConnectionStatus::Connected));
        assert!(health.is_ready());

        health.observe(&changed(BotStatus::Running, ConnectionStatus::Reconnecting));
        assert!(!health.is_ready());

        health.observe(&changed(BotStatus::Paused, ConnectionStatus::Connected));
        assert!(health.is_ready());

        health.observe(&changed(BotStatus::Stopped, ConnectionStatus::Disconnected));
        assert!(!health.is_ready());
    }
}
