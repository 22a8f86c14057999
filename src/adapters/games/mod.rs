//! Esports Game-Data Adapters
//!
//! - `client`: polled HTTP source implementing `GameFeed`
//! - `parser`: provider payload → `GameEvent` mapping and completion checks

pub mod client;
pub mod parser;

pub use client::EsportsClient;
