//! The seam between the resumable reader and whatever performs requests.

use std::sync::Arc;

use async_trait::async_trait;

use super::{DownloadError, FetchRequest};

/// Performs one logical request and yields its response.
///
/// Implementations own transport-level retries and backoff. The resumable
/// reader treats a returned error as terminal and validates every returned
/// response itself, so non-success statuses should be returned as responses
/// rather than converted into errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs `request` and returns the response headers with an unread body.
    async fn execute(&self, request: &FetchRequest) -> Result<reqwest::Response, DownloadError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &FetchRequest) -> Result<reqwest::Response, DownloadError> {
        (**self).execute(request).await
    }
}
