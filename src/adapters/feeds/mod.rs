//! Market Data Feed Adapters - Real-time Price Streaming
//!
//! - `kalshi_ws`: Kalshi WebSocket ticker/orderbook feed
//! - `orderbook`: Local book reconstruction from snapshots and deltas
//! - `backoff`: Reconnect delay schedule

pub mod backoff;
pub mod kalshi_ws;
pub mod orderbook;

pub use kalshi_ws::KalshiFeed;
