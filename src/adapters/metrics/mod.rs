//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics export on :9090 and health check
//! endpoints (/live, /ready) via axum 0.7. Both are fed by listeners
//! on the bot event bus.

pub mod health;
pub mod prometheus;

pub use health::{HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
