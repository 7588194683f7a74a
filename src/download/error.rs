//! Error types for the download module.
//!
//! Every variant carries the URL being fetched so a failure deep inside a
//! resume cycle can still be attributed when it reaches the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while opening or draining a resumable response.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset mid-body, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The provided URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The request descriptor could not be turned into an HTTP request.
    #[error("invalid request for {url}: {reason}")]
    InvalidRequest {
        /// The URL of the rejected request.
        url: String,
        /// Why the request was rejected.
        reason: String,
    },

    /// The HTTP client could not be constructed from its configuration.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status other than the one the attempt requires
    /// (200 for a fresh request, 206 for a ranged one).
    #[error("bad response status (HTTP {status}) fetching {url}: {body}")]
    BadResponseStatus {
        /// The URL that returned the status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Leading part of the response body, trimmed.
        body: String,
    },

    /// No response header allowed the total body length to be determined.
    #[error("missing size information (Content-Length) in response from {url}")]
    MissingSize {
        /// The URL whose response lacked a length.
        url: String,
    },

    /// More bytes arrived than the established size promised.
    #[error("read beyond the expected end of the response body from {url} ({count} vs. {size})")]
    ReadBeyondExpectedEnd {
        /// The URL being read.
        url: String,
        /// Bytes counted so far.
        count: u64,
        /// Established total size.
        size: u64,
    },

    /// A resumed response reports a total length different from the first response.
    #[error("content of {url} after resume has different length ({actual}) than before ({expected})")]
    LengthMismatch {
        /// The URL being read.
        url: String,
        /// Size established by the first response.
        expected: u64,
        /// Bytes already read plus the length reported by the resumed response.
        actual: u64,
    },

    /// A resumed response starts at a different byte than requested.
    #[error("resumed response from {url} starts at byte {actual}, requested byte {expected}")]
    RangeStartMismatch {
        /// The URL being read.
        url: String,
        /// Offset sent in the `Range` header.
        expected: u64,
        /// First byte reported by `Content-Range`.
        actual: u64,
    },

    /// The request's cancellation token was triggered.
    #[error("fetch of {url} cancelled")]
    Cancelled {
        /// The URL whose fetch was cancelled.
        url: String,
    },

    /// The reader was closed, or lost its response to a failed resume.
    #[error("response from {url} already closed")]
    Closed {
        /// The URL of the closed reader.
        url: String,
    },

    /// Successive resumes kept producing responses that yielded no bytes.
    #[error("resume of {url} stalled: {attempts} consecutive resumes produced no data")]
    ResumeStalled {
        /// The URL being read.
        url: String,
        /// Number of consecutive empty resumes.
        attempts: u32,
    },

    /// File system error while saving the body.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Maps a reqwest error to [`Timeout`](Self::Timeout) or [`Network`](Self::Network).
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a bad response status error.
    pub fn bad_response_status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::BadResponseStatus {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a missing size error.
    pub fn missing_size(url: impl Into<String>) -> Self {
        Self::MissingSize { url: url.into() }
    }

    /// Creates an overrun error.
    pub fn read_beyond_expected_end(url: impl Into<String>, count: u64, size: u64) -> Self {
        Self::ReadBeyondExpectedEnd {
            url: url.into(),
            count,
            size,
        }
    }

    /// Creates a length mismatch error.
    pub fn length_mismatch(url: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::LengthMismatch {
            url: url.into(),
            expected,
            actual,
        }
    }

    /// Creates a range start mismatch error.
    pub fn range_start_mismatch(url: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::RangeStartMismatch {
            url: url.into(),
            expected,
            actual,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a closed-stream error.
    pub fn closed(url: impl Into<String>) -> Self {
        Self::Closed { url: url.into() }
    }

    /// Creates a stalled resume error.
    pub fn resume_stalled(url: impl Into<String>, attempts: u32) -> Self {
        Self::ResumeStalled {
            url: url.into(),
            attempts,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for errors caused by the server breaking the range contract.
    ///
    /// These are never retried: re-requesting would hit the same inconsistency.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::BadResponseStatus { .. }
                | Self::MissingSize { .. }
                | Self::ReadBeyondExpectedEnd { .. }
                | Self::LengthMismatch { .. }
                | Self::RangeStartMismatch { .. }
        )
    }
}

// No `From<reqwest::Error>`: every variant needs the URL, which the source
// error does not reliably carry. Use the helper constructors instead.
