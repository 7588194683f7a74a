//! Request descriptor shared between the caller, the client and the reader.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RANGE};
use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::DownloadError;

/// Method, URL, headers and cancellation token of a request that may be
/// issued several times.
///
/// The resumable reader rewrites the `Range` header between attempts; every
/// other header is sent unchanged on each attempt. Cloning shares the
/// cancellation token, so cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    cancel: CancellationToken,
}

impl FetchRequest {
    /// Creates a request descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] if the URL does not parse or is
    /// not `http`/`https`.
    pub fn new(method: Method, url: &str) -> Result<Self, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }
        Ok(Self {
            method,
            url: parsed,
            headers: HeaderMap::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Creates a `GET` request descriptor.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn get(url: &str) -> Result<Self, DownloadError> {
        Self::new(Method::GET, url)
    }

    /// Replaces the cancellation token with one owned by the caller.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Adds a header sent on every attempt.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Headers sent on the next attempt.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The cancellation token shared with the caller.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true once the cancellation token has been triggered.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current `Range` header value, if any.
    #[must_use]
    pub fn range(&self) -> Option<&str> {
        self.headers.get(RANGE).and_then(|value| value.to_str().ok())
    }

    /// Requests the body from `offset` onwards, or the whole body when
    /// `offset` is zero.
    pub(crate) fn set_range_offset(&mut self, offset: u64) -> Result<(), DownloadError> {
        if offset == 0 {
            self.headers.remove(RANGE);
            return Ok(());
        }
        let value = HeaderValue::try_from(format!("bytes={offset}-"))
            .map_err(|e| DownloadError::invalid_request(self.url.as_str(), e.to_string()))?;
        self.headers.insert(RANGE, value);
        Ok(())
    }

    /// Builds a single-use reqwest request for one attempt.
    pub(crate) fn build(&self, client: &Client) -> Result<reqwest::Request, DownloadError> {
        client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
            .build()
            .map_err(|e| DownloadError::invalid_request(self.url.as_str(), e.to_string()))
    }
}
