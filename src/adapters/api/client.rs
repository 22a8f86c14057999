//! REST Client - Retrying HTTP Client for Venue APIs
//!
//! Wraps reqwest with a concurrency cap, exponential-backoff retries on
//! transient failures and JSON (de)serialization. Shared by the broker
//! and the esports data client.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for the REST client.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (doubles per attempt).
  pub retry_base_delay: Duration,
}

impl Default for RestClientConfig {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(30),
      max_concurrent: 10,
      max_retries: 3,
      retry_base_delay: Duration::from_millis(200),
    }
  }
}

/// Retrying JSON client.
pub struct RestClient {
  http: Client,
  config: RestClientConfig,
  semaphore: Arc<Semaphore>,
}

impl RestClient {
  pub fn new(config: RestClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self {
      http,
      semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
      config,
    })
  }

  /// GET `url` and decode the JSON body.
  pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
    self.execute(self.http.get(url), url).await
  }

  /// POST `body` as JSON to `url` and decode the JSON response.
  pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
    &self,
    url: &str,
    body: &B,
  ) -> Result<T> {
    self.execute(self.http.post(url).json(body), url).await
  }

  async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, url: &str) -> Result<T> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .context("Semaphore closed")?;

    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis() as u64, url, "Retrying request");
        sleep(delay).await;
      }

      let req = request.try_clone().context("Failed to clone request")?;

      match req.send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => {
            return response
              .json::<T>()
              .await
              .with_context(|| format!("Invalid JSON from {url}"));
          }
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(url, "Rate limited, backing off");
            last_error = Some(anyhow!("Rate limited"));
          }
          status if status.is_server_error() => {
            warn!(status = %status, url, "Server error, retrying");
            last_error = Some(anyhow!("Server error: {status}"));
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("API error {status}: {body}"));
          }
        },
        Err(e) => {
          warn!(error = %e, attempt, url, "Request failed");
          last_error = Some(e.into());
        }
      }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("Max retries exceeded")))
  }
}
