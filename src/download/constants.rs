//! Constants for the download module (timeouts, resume limits, header names).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes without a single byte arriving).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Maximum number of response body bytes attached to a bad-status error.
pub const BODY_SNIPPET_LIMIT: usize = 1024;

/// Consecutive resumes a single read may perform without receiving a byte.
pub const MAX_EMPTY_RESUMES: u32 = 8;

/// Uncompressed stored length reported by Google Cloud Storage.
///
/// GCS omits `Content-Length` when the response is transcoded with
/// `Content-Encoding`, but still reports the stored object length here.
pub const STORED_CONTENT_LENGTH: &str = "x-goog-stored-content-length";

/// Buffer size used when draining a reader into a file.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;
