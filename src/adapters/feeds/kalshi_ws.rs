//! Kalshi WebSocket Feed — Streaming Market Data Source
//!
//! Connects to the Kalshi trade WebSocket and emits [`FeedEvent`]s via a
//! broadcast channel. Implements the `MarketFeed` port trait so the
//! usecases layer never depends on transport details.
//!
//! Features:
//! - `ticker` messages (prices in cents) and `orderbook_snapshot` /
//!   `orderbook_delta` messages rebuilt into a local book
//! - Keep-alive ping every `ping_interval_secs`
//! - Auto-reconnect with exponential backoff, subscriptions re-sent on
//!   every successful reconnect, fatal event once attempts run out
//! - Event-driven via tokio::select! (NEVER polling)

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, instrument, warn};

use super::backoff::Backoff;
use super::orderbook::{BinaryBook, BookSide, BookStore};
use crate::config::FeedConfig;
use crate::domain::types::MarketId;
use crate::ports::market_feed::{FeedEvent, MarketFeed, MarketTick};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_BUFFER: usize = 4096;
const CHANNELS: [&str; 2] = ["ticker", "orderbook_delta"];

// ────────────────────────────────────────────
// Wire format
// ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    msg: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TickerMsg {
    market_ticker: String,
    #[serde(default)]
    yes_ask: Option<f64>,
    #[serde(default)]
    no_ask: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SnapshotMsg {
    market_ticker: String,
    #[serde(default)]
    yes: Vec<Vec<i64>>,
    #[serde(default)]
    no: Vec<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
struct DeltaMsg {
    market_ticker: String,
    price: u32,
    delta: i64,
    side: BookSide,
}

/// Decoded feed message.
#[derive(Debug)]
enum WireUpdate {
    Ticker(MarketTick),
    Snapshot { market: MarketId, book: BinaryBook },
    Delta(DeltaMsg),
    VenueError(String),
}

fn cents(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0) / 100.0
}

/// Parses one text frame. `Ok(None)` for acknowledgements and message
/// types this adapter does not consume.
fn decode(text: &str) -> Result<Option<WireUpdate>> {
    let envelope: Envelope = serde_json::from_str(text).context("Invalid Kalshi WS JSON")?;
    let Some(msg) = envelope.msg else {
        return Ok(None);
    };

    let update = match envelope.kind.as_str() {
        "ticker" => {
            let t: TickerMsg = serde_json::from_value(msg).context("Malformed ticker message")?;
            WireUpdate::Ticker(MarketTick {
                market_id: t.market_ticker,
                yes_ask: cents(t.yes_ask),
                no_ask: cents(t.no_ask),
            })
        }
        "orderbook_snapshot" => {
            let s: SnapshotMsg =
                serde_json::from_value(msg).context("Malformed orderbook snapshot")?;
            WireUpdate::Snapshot {
                book: BinaryBook::from_levels(&s.yes, &s.no),
                market: s.market_ticker,
            }
        }
        "orderbook_delta" => {
            WireUpdate::Delta(serde_json::from_value(msg).context("Malformed orderbook delta")?)
        }
        "error" => WireUpdate::VenueError(msg.to_string()),
        other => {
            debug!(kind = other, "Ignoring Kalshi WS message");
            return Ok(None);
        }
    };

    Ok(Some(update))
}

// ────────────────────────────────────────────
// Shared connection state
// ────────────────────────────────────────────

struct Shared {
    events: broadcast::Sender<FeedEvent>,
    subscriptions: RwLock<BTreeSet<MarketId>>,
    /// Writer half of the live socket, if any.
    outbound: RwLock<Option<mpsc::UnboundedSender<Message>>>,
    books: Mutex<BookStore>,
    next_id: AtomicU64,
}

impl Shared {
    fn emit(&self, event: FeedEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    fn command(&self, cmd: &str, market: &str) -> Message {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let payload = serde_json::json!({
            "id": id,
            "cmd": cmd,
            "params": {
                "channels": CHANNELS,
                "market_tickers": [market],
            },
        });
        Message::Text(payload.to_string())
    }

    async fn send(&self, message: Message) {
        if let Some(tx) = self.outbound.read().await.as_ref() {
            if tx.send(message).is_err() {
                debug!("Socket writer gone, command dropped");
            }
        }
    }

    async fn resubscribe_all(&self) {
        let markets: Vec<MarketId> = self.subscriptions.read().await.iter().cloned().collect();
        for market in markets {
            info!(market = %market, "Subscribing to ticker + orderbook");
            self.send(self.command("subscribe", &market)).await;
        }
    }

    async fn handle_text(&self, text: &str) {
        let update = match decode(text) {
            Ok(Some(update)) => update,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Failed to parse Kalshi message");
                self.emit(FeedEvent::Error(e.to_string()));
                return;
            }
        };

        let tick = match update {
            WireUpdate::Ticker(tick) => tick,
            WireUpdate::Snapshot { market, book } => {
                let mut books = self.books.lock().await;
                let (yes_ask, no_ask) = books.replace(&market, book).implied_asks();
                MarketTick {
                    market_id: market,
                    yes_ask,
                    no_ask,
                }
            }
            WireUpdate::Delta(d) => {
                let mut books = self.books.lock().await;
                let (yes_ask, no_ask) = books
                    .apply_delta(&d.market_ticker, d.side, d.price, d.delta)
                    .implied_asks();
                MarketTick {
                    market_id: d.market_ticker,
                    yes_ask,
                    no_ask,
                }
            }
            WireUpdate::VenueError(msg) => {
                warn!(error = %msg, "Kalshi reported an error");
                self.emit(FeedEvent::Error(msg));
                return;
            }
        };

        if tick.yes_ask == 0.0 && tick.no_ask == 0.0 {
            debug!(market = %tick.market_id, "Empty quote skipped");
            return;
        }
        self.emit(FeedEvent::Quote(tick));
    }

    /// One socket lifetime. `Ok` only on requested shutdown.
    async fn stream(
        &self,
        ws: WsStream,
        ping_interval: Duration,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        let (mut write, mut read) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        *self.outbound.write().await = Some(out_tx);

        self.resubscribe_all().await;
        self.emit(FeedEvent::Connected);
        info!("Kalshi WebSocket connected");

        let mut ping = tokio::time::interval(ping_interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ping.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                Some(outgoing) = out_rx.recv() => {
                    write.send(outgoing).await.context("WebSocket send failed")?;
                }
                _ = ping.tick() => {
                    write.send(Message::Ping(Vec::new())).await.context("Keep-alive ping failed")?;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text).await,
                        Some(Ok(Message::Close(frame))) => bail!("Closed by server: {frame:?}"),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(anyhow!("Kalshi WS error: {e}")),
                        None => bail!("Kalshi WS stream ended"),
                    }
                }
            }
        }
    }
}

/// Socket task: streams, then reconnects with backoff until shut down or
/// out of attempts.
async fn run_session(
    shared: Arc<Shared>,
    config: FeedConfig,
    url: String,
    first: WsStream,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut backoff = Backoff::new(
        Duration::from_millis(config.reconnect_base_delay_ms),
        config.max_reconnect_attempts,
    );
    let ping_interval = Duration::from_secs(config.ping_interval_secs);
    let mut next = Some(first);

    loop {
        if let Some(ws) = next.take() {
            backoff.reset();
            let outcome = shared.stream(ws, ping_interval, &mut shutdown_rx).await;
            *shared.outbound.write().await = None;
            match outcome {
                Ok(()) => {
                    info!("Kalshi feed shut down gracefully");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Kalshi WS disconnected");
                    shared.emit(FeedEvent::Error(e.to_string()));
                }
            }
        }

        let Some((attempt, delay)) = backoff.next_delay() else {
            error!(attempts = backoff.attempts(), "Max reconnect attempts reached");
            shared.emit(FeedEvent::Fatal("Max reconnect attempts reached".to_string()));
            return;
        };

        info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting to Kalshi");
        shared.emit(FeedEvent::Reconnecting { attempt, delay });

        tokio::select! {
            _ = shutdown_rx.recv() => return,
            () = tokio::time::sleep(delay) => {}
        }

        match connect_async(url.as_str()).await {
            Ok((ws, _)) => next = Some(ws),
            Err(e) => {
                warn!(error = %e, attempt, "Reconnect failed");
                shared.emit(FeedEvent::Error(format!("Reconnect failed: {e}")));
            }
        }
    }
}

struct Session {
    simulated: bool,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Kalshi WebSocket feed adapter.
pub struct KalshiFeed {
    config: FeedConfig,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl KalshiFeed {
    pub fn new(config: &FeedConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            config: config.clone(),
            shared: Arc::new(Shared {
                events,
                subscriptions: RwLock::new(BTreeSet::new()),
                outbound: RwLock::new(None),
                books: Mutex::new(BookStore::default()),
                next_id: AtomicU64::new(0),
            }),
            session: Mutex::new(None),
        }
    }

    async fn close_session(session: Session) {
        let _ = session.shutdown_tx.send(());
        if let Err(e) = session.handle.await {
            warn!(error = %e, "Kalshi feed task ended abnormally");
        }
    }
}

#[async_trait]
impl MarketFeed for KalshiFeed {
    #[instrument(skip(self))]
    async fn connect(&self, simulated: bool) -> Result<()> {
        let mut session = self.session.lock().await;

        if let Some(live) = session.as_ref() {
            if live.simulated == simulated && !live.handle.is_finished() {
                debug!("Already connected");
                return Ok(());
            }
        }
        if let Some(old) = session.take() {
            Self::close_session(old).await;
        }

        let url = self.config.url(simulated).to_string();
        let mode = if simulated { "DEMO" } else { "PRODUCTION" };
        info!(url = %url, mode, "Connecting to Kalshi WebSocket");

        let (ws, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Kalshi WebSocket connection to {url} failed"))?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_session(
            Arc::clone(&self.shared),
            self.config.clone(),
            url,
            ws,
            shutdown_rx,
        ));

        *session = Some(Session {
            simulated,
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    async fn subscribe(&self, market_id: &MarketId) -> Result<()> {
        let added = self.shared.subscriptions.write().await.insert(market_id.clone());
        if added {
            info!(market = %market_id, "Subscribing to ticker + orderbook");
            self.shared
                .send(self.shared.command("subscribe", market_id))
                .await;
        }
        Ok(())
    }

    async fn unsubscribe(&self, market_id: &MarketId) -> Result<()> {
        let removed = self.shared.subscriptions.write().await.remove(market_id);
        self.shared.books.lock().await.remove(market_id);
        if removed {
            info!(market = %market_id, "Unsubscribing");
            self.shared
                .send(self.shared.command("unsubscribe", market_id))
                .await;
        }
        Ok(())
    }

    async fn disconnect(&self) {
        info!("Disconnecting Kalshi feed");
        let closed = self.session.lock().await.take();
        if let Some(session) = closed {
            Self::close_session(session).await;
            self.shared.emit(FeedEvent::Disconnected);
        }
        self.shared.subscriptions.write().await.clear();
        self.shared.books.lock().await.clear();
        *self.shared.outbound.write().await = None;
    }

    fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.shared.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ticker_converts_cents() {
        let text = r#"{"type":"ticker","sid":1,"msg":{"market_ticker":"KXLOL-1","yes_ask":56,"no_ask":46,"volume":10}}"#;
        match decode(text).unwrap() {
            Some(WireUpdate::Ticker(t)) => {
                assert_eq!(t.market_id, "KXLOL-1");
                assert!((t.yes_ask - 0.56).abs() < 1e-12);
                assert!((t.no_ask - 0.46).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_snapshot_and_delta() {
        let snap = r#"{"type":"orderbook_snapshot","msg":{"market_ticker":"M","yes":[[40,10]],"no":[[55,2]]}}"#;
        match decode(snap).unwrap() {
            Some(WireUpdate::Snapshot { market, book }) => {
                assert_eq!(market, "M");
                let (yes, no) = book.implied_asks();
                assert!((yes - 0.45).abs() < 1e-12);
                assert!((no - 0.60).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }

        let delta = r#"{"type":"orderbook_delta","msg":{"market_ticker":"M","price":55,"delta":-2,"side":"no"}}"#;
        match decode(delta).unwrap() {
            Some(WireUpdate::Delta(d)) => {
                assert_eq!(d.side, BookSide::No);
                assert_eq!(d.delta, -2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_ignores_acks_and_rejects_garbage() {
        assert!(decode(r#"{"type":"subscribed","msg":{"channel":"ticker","sid":1}}"#)
            .unwrap()
            .is_none());
        assert!(decode(r#"{"id":3,"type":"ok"}"#).unwrap().is_none());
        assert!(decode("not json").is_err());
    }

    #[tokio::test]
    async fn test_empty_ticker_not_emitted() {
        let feed = KalshiFeed::new(&FeedConfig::default());
        let mut rx = feed.events();
        feed.shared
            .handle_text(r#"{"type":"ticker","msg":{"market_ticker":"M","yes_ask":0,"no_ask":0}}"#)
            .await;
        feed.shared
            .handle_text(r#"{"type":"ticker","msg":{"market_ticker":"M","yes_ask":30,"no_ask":72}}"#)
            .await;
        match rx.try_recv().unwrap() {
            FeedEvent::Quote(t) => assert!((t.yes_ask - 0.30).abs() < 1e-12),
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_reports_closed_socket() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let feed = KalshiFeed::new(&FeedConfig {
            demo_ws_url: format!("ws://{addr}"),
            ..FeedConfig::default()
        });
        let mut rx = feed.events();
        feed.connect(true).await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(first.unwrap(), FeedEvent::Connected);

        feed.disconnect().await;
        let next = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(next.unwrap(), FeedEvent::Disconnected);
        tokio::time::timeout(Duration::from_secs(2), server).await.unwrap().unwrap();

        // nothing open, nothing reported
        feed.disconnect().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_is_remembered() {
        let feed = KalshiFeed::new(&FeedConfig::default());
        feed.subscribe(&"M1".to_string()).await.unwrap();
        feed.subscribe(&"M2".to_string()).await.unwrap();
        feed.unsubscribe(&"M1".to_string()).await.unwrap();
        let subs = feed.shared.subscriptions.read().await.clone();
        assert_eq!(subs.into_iter().collect::<Vec<_>>(), vec!["M2".to_string()]);
    }
}
