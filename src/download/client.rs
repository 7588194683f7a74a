//! Retrying HTTP client.
//!
//! This module provides [`HttpClient`], the reqwest-backed [`Transport`]
//! used by the resumable reader. Each call to [`Transport::execute`] is one
//! logical request: connection failures, timeouts and retryable statuses are
//! retried under the configured [`RetryPolicy`], and the caller only sees the
//! final outcome.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tracing::{debug, instrument, warn};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::retry::{RetryDecision, RetryPolicy, classify_error, classify_http_status, parse_retry_after};
use super::{DownloadError, FetchRequest, Transport};
use crate::user_agent;

/// Settings used to build an [`HttpClient`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use refetch_core::download::{ClientConfig, HttpClient, RetryPolicy};
///
/// let config = ClientConfig::default()
///     .with_connect_timeout(Duration::from_secs(10))
///     .with_retry_policy(RetryPolicy::with_max_attempts(5));
/// let client = HttpClient::with_config(config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    connect_timeout: Duration,
    read_timeout: Duration,
    user_agent: String,
    decompress: bool,
    retry_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            user_agent: user_agent::default_user_agent(),
            decompress: false,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Sets the TCP/TLS connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout between two body reads.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Overrides the User-Agent header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enables transparent gzip decoding.
    ///
    /// Resume offsets count decoded bytes, so only enable this for servers
    /// that do not compress ranged responses.
    #[must_use]
    pub fn with_decompression(mut self, decompress: bool) -> Self {
        self.decompress = decompress;
        self
    }

    /// Sets the per-request retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

/// HTTP client with bounded retries, usable as a [`Transport`].
///
/// Create it once and share it; the underlying connection pool is reused
/// across requests and across resumes.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry_policy: RetryPolicy,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static default
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client from explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if reqwest rejects the configuration.
    #[instrument(level = "debug")]
    pub fn with_config(config: ClientConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .gzip(config.decompress)
            .user_agent(config.user_agent)
            .build()
            .map_err(|source| DownloadError::ClientBuild { source })?;
        Ok(Self {
            client,
            retry_policy: config.retry_policy,
        })
    }

    /// Returns the retry policy applied to each request.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Waits out a backoff delay, aborting early on cancellation.
    async fn backoff(&self, request: &FetchRequest, delay: Duration) -> Result<(), DownloadError> {
        tokio::select! {
            biased;
            () = request.cancellation().cancelled() => {
                Err(DownloadError::cancelled(request.url().as_str()))
            }
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self, request), fields(url = %request.url(), range = request.range()))]
    async fn execute(&self, request: &FetchRequest) -> Result<reqwest::Response, DownloadError> {
        let url = request.url().as_str();
        let mut attempt: u32 = 1;

        loop {
            if request.is_cancelled() {
                return Err(DownloadError::cancelled(url));
            }
            let built = request.build(&self.client)?;
            debug!(attempt, "sending request");

            let outcome = tokio::select! {
                biased;
                () = request.cancellation().cancelled() => {
                    return Err(DownloadError::cancelled(url));
                }
                outcome = self.client.execute(built) => outcome,
            };

            match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let failure_type = classify_http_status(status);
                    if !failure_type.is_retryable() {
                        return Ok(response);
                    }

                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|value| value.to_str().ok())
                        .and_then(parse_retry_after);

                    match self.retry_policy.should_retry(failure_type, attempt) {
                        RetryDecision::Retry { delay, attempt: next } => {
                            let delay = retry_after.map_or(delay, |server| server.max(delay));
                            debug!(status, delay_ms = delay.as_millis(), "retryable status");
                            drop(response);
                            self.backoff(request, delay).await?;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            warn!(status, attempt, %reason, "giving up on retryable status");
                            return Ok(response);
                        }
                    }
                }
                Err(source) => {
                    let error = DownloadError::transport(url, source);
                    match self.retry_policy.should_retry(classify_error(&error), attempt) {
                        RetryDecision::Retry { delay, attempt: next } => {
                            debug!(error = %error, delay_ms = delay.as_millis(), "request failed");
                            self.backoff(request, delay).await?;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            warn!(error = %error, attempt, %reason, "request failed");
                            return Err(error);
                        }
                    }
                }
            }
        }
    }
}
