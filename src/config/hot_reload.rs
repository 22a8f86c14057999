//! Config Hot-Reload — Re-read config.toml Periodically
//!
//! Re-reads config.toml on a fixed period and publishes it on a
//! `tokio::sync::watch` channel, but only wakes receivers when a section
//! the running bot can apply changed (`trading`, `market_maker`,
//! `momentum`). Endpoint or metrics edits still need a restart.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::AppConfig;
use super::loader::load_config;

/// Default re-read period.
pub const RELOAD_INTERVAL: Duration = Duration::from_secs(60);

/// Polls config.toml and publishes live-applicable changes.
///
/// A plain timer rather than a filesystem watcher: it behaves the same on
/// Linux, macOS and Docker bind mounts.
pub struct ConfigWatcher {
  config_path: String,
  interval: Duration,
  config_tx: watch::Sender<AppConfig>,
}

impl ConfigWatcher {
  /// Returns the watcher and the receiver consumers read updates from.
  pub fn new(
    config_path: &str,
    initial_config: AppConfig,
    interval: Duration,
  ) -> (Self, watch::Receiver<AppConfig>) {
    let (config_tx, config_rx) = watch::channel(initial_config);
    (
      Self {
        config_path: config_path.to_string(),
        interval,
        config_tx,
      },
      config_rx,
    )
  }

  /// Runs until shutdown.
  #[instrument(skip(self, shutdown_rx))]
  pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
    info!(
      path = %self.config_path,
      interval_secs = self.interval.as_secs(),
      "Config watcher started"
    );

    let mut ticker = tokio::time::interval(self.interval);
    ticker.tick().await;

    loop {
      tokio::select! {
        biased;
        _ = shutdown_rx.recv() => {
          info!("Config watcher shutting down");
          return Ok(());
        }
        _ = ticker.tick() => {
          self.reload();
        }
      }
    }
  }

  /// Re-reads the file once. Returns `true` when receivers were notified.
  pub fn reload(&self) -> bool {
    let fresh = match load_config(&self.config_path) {
      Ok(config) => config,
      Err(e) => {
        warn!(error = %e, "Failed to reload config, keeping current");
        return false;
      }
    };

    let changed = self.config_tx.send_if_modified(|current| {
      let live_change = current.trading != fresh.trading
        || current.market_maker != fresh.market_maker
        || current.momentum != fresh.momentum;
      if live_change {
        *current = fresh;
      }
      live_change
    });

    if changed {
      info!("Config change detected, publishing");
    } else {
      debug!("Config unchanged");
    }
    changed
  }
}
