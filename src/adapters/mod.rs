//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, WebSockets). Each sub-module
//! groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `api`: Kalshi REST client, order placement and price snapshots
//! - `feeds`: Kalshi WebSocket market data with local order books
//! - `games`: Esports match data polling and parsing
//! - `metrics`: Prometheus metrics export and health checks

pub mod api;
pub mod feeds;
pub mod games;
pub mod metrics;
