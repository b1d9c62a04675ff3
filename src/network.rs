use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::{timeout, Instant};

use crate::backoff::ExponentialBackoff;
use crate::config::Config;
use crate::url_utils;

/// A fetched page, ready for extraction.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status_code: u16,
    pub body: String,
}

/// Fetch transport. Static HTML clients and browser renderers both plug in here.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RenderedPage, FetchError>;
}

/// HTTP client for review listing pages
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout_duration: Duration,
    pub max_content_size: usize,
    same_host_delay: Duration,
    max_retries: u32,
    backoff: ExponentialBackoff,
    // Earliest instant the next request to a host may start.
    host_ready_at: DashMap<String, Instant>,
}

impl HttpClient {
    pub fn new(user_agent: String, timeout_secs: u64) -> Result<Self, FetchError> {
        Self::builder(user_agent, timeout_secs).build()
    }

    pub fn builder(user_agent: String, timeout_secs: u64) -> HttpClientBuilder {
        HttpClientBuilder {
            user_agent,
            timeout_secs,
            max_content_size: Config::MAX_CONTENT_SIZE,
            same_host_delay: Duration::from_secs(Config::SAME_DOMAIN_DELAY_SECS),
            max_retries: Config::MAX_RETRIES,
        }
    }

    /// Wait until the host's politeness window opens, then book the next slot.
    async fn wait_for_host(&self, url: &str) {
        if self.same_host_delay.is_zero() {
            return;
        }
        let Some(host) = url_utils::extract_host(url) else {
            return;
        };

        let start_at = {
            let now = Instant::now();
            let mut ready_at = self.host_ready_at.entry(host).or_insert(now);
            let start_at = (*ready_at).max(now);
            *ready_at = start_at + self.same_host_delay;
            start_at
        };
        tokio::time::sleep_until(start_at).await;
    }

    /// Fetch once (internal helper for retry logic)
    async fn fetch_once(&self, url: &str) -> Result<RenderedPage, FetchError> {
        self.wait_for_host(url).await;

        let response = timeout(
            self.timeout_duration,
            self.client
                .get(url)
                .header(
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .header("Accept-Language", "cs-CZ,cs;q=0.9,en;q=0.5")
                .send(),
        )
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(Self::classify_error)?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(FetchError::Status(status_code));
        }

        let final_url = response.url().to_string();
        if let Some(content_type) = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
        {
            if !url_utils::is_html_content_type(content_type) {
                return Err(FetchError::NotHtml(content_type.to_string()));
            }
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(length as usize, self.max_content_size));
            }
        }

        let body = timeout(self.timeout_duration, response.text())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::BodyError(e.to_string()))?;

        if body.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len(), self.max_content_size));
        }

        Ok(RenderedPage {
            url: url.to_string(),
            final_url,
            status_code,
            body,
        })
    }

    /// Classify reqwest errors into our FetchError types
    fn classify_error(error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            return FetchError::Timeout;
        }
        if error.is_connect() {
            return FetchError::ConnectionRefused;
        }
        if error.is_builder() {
            return FetchError::InvalidUrl(error.to_string());
        }
        FetchError::NetworkError(error.to_string())
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    /// Fetch with bounded retries and exponential backoff for transient errors.
    async fn fetch(&self, url: &str) -> Result<RenderedPage, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff.delay(attempt);
                    attempt += 1;
                    tracing::debug!(url, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying fetch");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

pub struct HttpClientBuilder {
    user_agent: String,
    timeout_secs: u64,
    max_content_size: usize,
    same_host_delay: Duration,
    max_retries: u32,
}

impl HttpClientBuilder {
    pub fn max_content_size(mut self, bytes: usize) -> Self {
        self.max_content_size = bytes;
        self
    }

    pub fn same_host_delay(mut self, delay: Duration) -> Self {
        self.same_host_delay = delay;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn build(self) -> Result<HttpClient, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(Config::CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(Config::POOL_IDLE_PER_HOST)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpClient {
            client,
            timeout_duration: Duration::from_secs(self.timeout_secs),
            max_content_size: self.max_content_size,
            same_host_delay: self.same_host_delay,
            max_retries: self.max_retries,
            backoff: ExponentialBackoff::new(Config::RETRY_BACKOFF_MS, Config::RETRY_BACKOFF_MAX_MS),
            host_ready_at: DashMap::new(),
        })
    }
}

/// Errors that can occur during fetching
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection refused - server not accepting connections")]
    ConnectionRefused,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Not an HTML page: {0}")]
    NotHtml(String),

    #[error("Failed to read response body: {0}")]
    BodyError(String),

    #[error("Content too large: {0} bytes (max: {1} bytes)")]
    ContentTooLarge(usize, usize),
}

impl FetchError {
    /// Check if this error is retryable (transient) or permanent
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::NetworkError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("broken pipe")
                    || msg_lower.contains("connection reset")
                    || msg_lower.contains("temporary")
            }
            FetchError::ConnectionRefused
            | FetchError::InvalidUrl(_)
            | FetchError::NotHtml(_)
            | FetchError::BodyError(_)
            | FetchError::ContentTooLarge(_, _) => false,
        }
    }
}
