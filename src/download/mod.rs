//! Resumable HTTP fetching.
//!
//! This module turns a single HTTP GET into a byte stream that survives
//! dropped connections: when a body is cut short, the request is re-issued
//! with a `Range` header and reading continues where it stopped.
//!
//! # Features
//!
//! - Streaming reads (memory-efficient for large bodies)
//! - Automatic resume via `Range: bytes=<offset>-` after connection failures
//! - Consistency checks across resumes (status, length, range start)
//! - Retry with exponential backoff for transient request failures
//! - Cooperative cancellation through a shared [`CancellationToken`]
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use refetch_core::download::{FetchRequest, HttpClient, ResumableReader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpClient::new());
//! let request = FetchRequest::get("https://example.com/dataset.tar")?;
//! let reader = ResumableReader::open(client, request).await?;
//! let written = reader.save_to_file(Path::new("./dataset.tar")).await?;
//! println!("{written} bytes, {} resumes", reader.resumes());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod length;
mod request;
mod resumable;
mod retry;
mod transport;

pub use client::{ClientConfig, HttpClient};
pub use error::DownloadError;
pub use length::{ContentRange, DeclaredLength, LengthSource};
pub use request::FetchRequest;
pub use resumable::{Counter, ResponseInfo, ResumableReader};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    classify_http_status, parse_retry_after,
};
pub use tokio_util::sync::CancellationToken;
pub use transport::Transport;

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
