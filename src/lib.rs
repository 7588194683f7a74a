//! Refetch Core Library
//!
//! This library reads HTTP response bodies to completion over unreliable
//! connections. A [`ResumableReader`] wraps one GET request; whenever the
//! body is cut short it re-requests the remainder with a `Range` header and
//! splices the new response onto the stream, so the caller sees a single
//! byte stream of exactly the advertised length or an explicit error.
//!
//! # Architecture
//!
//! - [`download`] - request descriptor, retrying client and the resumable reader
//!
//! The `refetch` binary in this package is a thin CLI over [`download`].

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
mod user_agent;

// Re-export commonly used types
pub use download::{
    CancellationToken, ClientConfig, Counter, DEFAULT_MAX_RETRIES, DownloadError, FailureType,
    FetchRequest, HttpClient, ResponseInfo, ResumableReader, RetryDecision, RetryPolicy,
    Transport, classify_error,
};
