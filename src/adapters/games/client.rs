//! Esports data client implementing the `GameFeed` port.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::parser::{is_match_complete, parse_events};
use crate::adapters::api::RestClient;
use crate::config::EsportsConfig;
use crate::domain::types::{GameType, MatchTarget};
use crate::ports::game_feed::{GameFeed, MatchSnapshot};

pub struct EsportsClient {
    client: Arc<RestClient>,
    config: EsportsConfig,
}

impl EsportsClient {
    pub fn new(client: Arc<RestClient>, config: &EsportsConfig) -> Self {
        Self {
            client,
            config: config.clone(),
        }
    }

    fn match_url(&self, target: &MatchTarget) -> String {
        match target.game {
            GameType::Lol => format!("{}/{}/live", self.config.lol_api_url, target.match_id),
            GameType::Dota => format!("{}/{}", self.config.dota_api_url, target.match_id),
        }
    }
}

#[async_trait]
impl GameFeed for EsportsClient {
    #[instrument(skip(self), fields(game = %target.game, match_id = %target.match_id))]
    async fn poll(&self, target: &MatchTarget) -> Result<MatchSnapshot> {
        let url = self.match_url(target);
        let raw: Value = self
            .client
            .get_json(&url)
            .await
            .context("Failed to fetch game data")?;

        let snapshot = MatchSnapshot {
            events: parse_events(&raw, target.game),
            complete: is_match_complete(&raw, target.game),
        };
        debug!(events = snapshot.events.len(), complete = snapshot.complete, "Polled match");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::api::RestClientConfig;

    #[test]
    fn test_match_urls() {
        let client = EsportsClient::new(
            Arc::new(RestClient::new(RestClientConfig::default()).unwrap()),
            &EsportsConfig::default(),
        );
        let lol = MatchTarget {
            game: GameType::Lol,
            match_id: "123".to_string(),
        };
        let dota = MatchTarget {
            game: GameType::Dota,
            match_id: "987".to_string(),
        };
        assert_eq!(client.match_url(&lol), "https://api.pandascore.co/lol/matches/123/live");
        assert_eq!(client.match_url(&dota), "https://api.opendota.com/api/matches/987");
    }
}
