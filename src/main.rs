//! Prediction Edge Bot — Entry Point
//!
//! Initializes configuration, logging and adapters, then drives one
//! trading session until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Create REST clients, Kalshi broker, Kalshi feed, esports client
//! 4. Build the TradingBot and attach metrics/health listeners
//! 5. Spawn metrics server, health server and config watcher
//! 6. Start the configured market (and match, if any)
//! 7. Wait for SIGINT → stop the session → broadcast shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use prediction_edge_bot::adapters::api::{KalshiBroker, RestClient, RestClientConfig};
use prediction_edge_bot::adapters::feeds::KalshiFeed;
use prediction_edge_bot::adapters::games::EsportsClient;
use prediction_edge_bot::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use prediction_edge_bot::config::hot_reload::RELOAD_INTERVAL;
use prediction_edge_bot::config::{AppConfig, ConfigWatcher, load_config};
use prediction_edge_bot::ports::GameFeed;
use prediction_edge_bot::usecases::{BotPorts, BotSettings, StartRequest, TradingBot};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = load_config(CONFIG_PATH).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        dry_run = config.bot.dry_run,
        strategy = %config.bot.strategy,
        "Starting Prediction Edge Bot"
    );

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 3. Adapters ─────────────────────────────────────────
    let broker_http = Arc::new(
        RestClient::new(RestClientConfig {
            timeout: Duration::from_secs(config.api.timeout_seconds),
            max_retries: config.api.max_retries,
            ..RestClientConfig::default()
        })
        .context("Failed to create broker HTTP client")?,
    );
    let broker = Arc::new(KalshiBroker::new(
        broker_http,
        &config.api,
        &config.rate_limits,
    ));
    let feed = Arc::new(KalshiFeed::new(&config.feed));

    let games: Option<Arc<dyn GameFeed>> = if config.esports.match_target.is_some() {
        let games_http = Arc::new(
            RestClient::new(RestClientConfig {
                timeout: Duration::from_secs(config.esports.timeout_seconds),
                ..RestClientConfig::default()
            })
            .context("Failed to create esports HTTP client")?,
        );
        Some(Arc::new(EsportsClient::new(games_http, &config.esports)) as Arc<dyn GameFeed>)
    } else {
        None
    };

    // ── 4. Controller + bus listeners ───────────────────────
    let bot = TradingBot::new(
        BotSettings::from_config(&config),
        BotPorts {
            feed,
            orders: broker.clone(),
            prices: broker,
            games,
        },
    );

    let health = Arc::new(HealthState::new());
    let health_listener = Arc::clone(&health);
    let _health_sub = bot.subscribe(move |event| {
        health_listener.observe(event);
        Ok(())
    });

    // ── 5. Background servers and config watcher ────────────
    let mut handles = Vec::new();

    if config.metrics.enabled {
        let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
        let metrics_listener = Arc::clone(&metrics);
        let _metrics_sub = bot.subscribe(move |event| {
            metrics_listener.observe(event);
            Ok(())
        });
        let bind = config.metrics.bind_address.clone();
        let rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = metrics.serve(bind, rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }));
    }

    let health_server = HealthServer::new(health, config.metrics.health_port);
    let rx = shutdown_tx.subscribe();
    handles.push(tokio::spawn(async move {
        if let Err(e) = health_server.run(rx).await {
            error!(error = %e, "Health server failed");
        }
    }));

    let (watcher, config_rx) = ConfigWatcher::new(CONFIG_PATH, config.clone(), RELOAD_INTERVAL);
    let rx = shutdown_tx.subscribe();
    handles.push(tokio::spawn(async move {
        if let Err(e) = watcher.run(rx).await {
            error!(error = %e, "Config watcher failed");
        }
    }));
    handles.push(tokio::spawn(forward_config_updates(
        bot.clone(),
        config_rx,
        shutdown_tx.subscribe(),
    )));

    // ── 6. Start the configured session ─────────────────────
    start_configured(&bot, &config).await;

    // ── 7. Wait for SIGINT ──────────────────────────────────
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for SIGINT");
    }
    info!("SIGINT received, initiating graceful shutdown");

    if bot.get_state().await.status.is_active() {
        if let Err(e) = bot.stop().await {
            warn!(error = %e, "Stop during shutdown failed");
        }
    }

    let _ = shutdown_tx.send(());
    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    let stats = bot.get_stats().await;
    info!(
        pnl = stats.pnl,
        trades = stats.trade_count,
        position = stats.position,
        "Shutdown complete"
    );
    Ok(())
}

/// Starts trading the configured market, if one is set.
async fn start_configured(bot: &TradingBot, config: &AppConfig) {
    let ticker = config.trading.market_ticker.trim();
    if ticker.is_empty() {
        warn!("No market_ticker configured, bot stays idle");
        return;
    }

    let mut request = StartRequest::market(ticker).dry_run(config.bot.dry_run);
    if let Some(target) = config.esports.match_target.clone() {
        request = request.with_match(target);
    }

    if let Err(e) = bot.start(request).await {
        error!(error = %e, "Bot failed to start");
    }
}

/// Pushes live-applicable config changes into the running bot.
async fn forward_config_updates(
    bot: TradingBot,
    mut config_rx: watch::Receiver<AppConfig>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let fresh = config_rx.borrow_and_update().clone();
                match bot.apply_reload(&fresh).await {
                    Ok(()) => info!("Reloaded trading config applied"),
                    Err(e) => warn!(error = %e, "Reloaded config rejected"),
                }
            }
        }
    }
}
