//! Broker REST API Adapter
//!
//! HTTP side of the venue: a retrying JSON client shared by every REST
//! consumer, and the Kalshi broker implementing the execution ports.
//!
//! Sub-modules:
//! - `client`: HTTP client with concurrency cap and retries
//! - `orders`: Order placement and market price snapshots

pub mod client;
pub mod orders;

pub use client::{RestClient, RestClientConfig};
pub use orders::KalshiBroker;
