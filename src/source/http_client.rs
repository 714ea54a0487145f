use crate::config::FetchConfig;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Rate limits, server errors and transport failures are worth another try.
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status(s) => *s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error(),
            Self::Transport(_) => true,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status(StatusCode::NOT_FOUND))
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
    request_delay: Duration,
    max_retries: usize,
    /// Earliest instant the next request may go out, shared by every task
    /// holding this client.
    next_slot: Mutex<Instant>,
}

impl HttpClient {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            request_delay: Duration::from_millis(config.request_delay_ms),
            max_retries: config.max_retries,
            next_slot: Mutex::new(Instant::now()),
        })
    }

    /// Claim the next request slot and sleep until it opens. Slots are
    /// `request_delay` apart no matter how many tasks share the client.
    async fn wait_turn(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.request_delay;
            slot
        };
        sleep_until(slot).await;
    }

    /// Fetch a URL as text, retrying transient failures with jittered
    /// exponential backoff (roughly 1s, 2s, 4s, ...). Every attempt waits for
    /// its rate-limit slot first.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(500)
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(self.max_retries);

        let mut attempt = 0u32;
        RetryIf::spawn(
            strategy,
            || {
                attempt += 1;
                debug!("GET {} (attempt {})", url, attempt);
                async move {
                    self.wait_turn().await;
                    self.get_once(url).await
                }
            },
            |e: &FetchError| {
                let retry = e.is_retryable();
                if retry {
                    warn!("{} failed: {}, backing off", url, e);
                }
                retry
            },
        )
        .await
    }

    async fn get_once(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.inner.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        Ok(resp.text().await?)
    }
}
