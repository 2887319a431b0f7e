//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - A global permit pool bounding concurrent logical fetches
//! - Iterative retry with exponential backoff
//! - Error classification

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::CrawlerConfig;

/// Errors produced by a fetch operation
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Retries exhausted for {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Retrieval of page content by address
///
/// The production implementation is [`HttpFetcher`]; tests substitute
/// doubles to exercise the orchestration without a network.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches the content at `url`, retrying transient failures
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Retry schedule: up to `max_retries` retries with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before the retry with the given index (starting at 0):
    /// `base_delay * 2^attempt_index`
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt_index)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent string to send with every request
/// * `timeout` - Per-request timeout
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP fetcher with a global concurrency ceiling
///
/// A fixed-size permit pool bounds the number of in-flight logical
/// fetches; the permit is held for the whole retry sequence of one fetch,
/// including backoff sleeps, so retries of a slow address cannot multiply
/// the real request pressure.
pub struct HttpFetcher {
    client: Client,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawler configuration
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.request_timeout_secs),
        )?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.concurrency as usize)),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_base_ms),
            },
        })
    }

    /// Performs one HTTP attempt without retry handling
    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify_error(url, e))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        // The permit is held across all attempts and backoff sleeps.
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Network {
                url: url.to_string(),
                message: "concurrency pool closed".to_string(),
            })?;

        let mut last_error = String::new();

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.backoff_delay(attempt - 1);
                tracing::warn!(
                    "Request failed for {}, retrying in {:?} (attempt {}/{}): {}",
                    url,
                    delay,
                    attempt,
                    self.retry.max_retries,
                    last_error
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(e) => last_error = e.to_string(),
            }
        }

        tracing::error!(
            "Failed to fetch {} after {} retries: {}",
            url,
            self.retry.max_retries,
            last_error
        );

        Err(FetchError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.retry.max_retries + 1,
            last_error,
        })
    }
}

/// Classifies a reqwest error into a typed fetch error
fn classify_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
