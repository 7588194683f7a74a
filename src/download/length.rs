//! Response length discovery.
//!
//! A response may announce its length three ways. They are consulted in a
//! fixed order and the first usable one wins:
//!
//! 1. `Content-Length`
//! 2. `X-Goog-Stored-Content-Length` (sent by GCS when it drops
//!    `Content-Length` for transcoded content)
//! 3. `Content-Range`, as `last - first + 1`

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap};

use super::constants::STORED_CONTENT_LENGTH;

/// Header a [`DeclaredLength`] was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthSource {
    /// `Content-Length`.
    ContentLength,
    /// `X-Goog-Stored-Content-Length`.
    StoredContentLength,
    /// Derived from `Content-Range`.
    ContentRange,
}

/// Number of body bytes a single response will deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredLength {
    /// Body length in bytes.
    pub length: u64,
    /// Header the length came from.
    pub source: LengthSource,
}

/// A parsed `Content-Range: bytes <first>-<last>/<total>` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ContentRange {
    /// Offset of the first byte in the body.
    pub first: u64,
    /// Offset of the last byte in the body (inclusive).
    pub last: u64,
    /// Complete resource size, `None` when the server sent `*`.
    pub total: Option<u64>,
}

impl ContentRange {
    /// Parses a `Content-Range` header value.
    ///
    /// Returns `None` for unsatisfied ranges (`bytes */N`), other units,
    /// `last < first`, or a total that does not cover `last`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("bytes ")?;
        let (range, total) = rest.trim().split_once('/')?;
        let (first, last) = range.trim().split_once('-')?;
        let first = first.trim().parse::<u64>().ok()?;
        let last = last.trim().parse::<u64>().ok()?;
        if last < first {
            return None;
        }
        let total = match total.trim() {
            "*" => None,
            total => {
                let total = total.parse::<u64>().ok()?;
                if total <= last {
                    return None;
                }
                Some(total)
            }
        };
        Some(Self { first, last, total })
    }

    /// Number of bytes covered by the range.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.last - self.first + 1
    }

    /// Always false: a valid range covers at least one byte.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Parses the `Content-Range` header, if present and well formed.
#[must_use]
pub fn content_range(headers: &HeaderMap) -> Option<ContentRange> {
    headers
        .get(CONTENT_RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(ContentRange::parse)
}

/// Parses the `Content-Length` header, if present and numeric.
#[must_use]
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    parse_u64_header(headers, CONTENT_LENGTH.as_str())
}

/// Resolves the body length of a response from its headers.
#[must_use]
pub fn declared_length(headers: &HeaderMap) -> Option<DeclaredLength> {
    if let Some(length) = content_length(headers) {
        return Some(DeclaredLength {
            length,
            source: LengthSource::ContentLength,
        });
    }
    if let Some(length) = parse_u64_header(headers, STORED_CONTENT_LENGTH) {
        return Some(DeclaredLength {
            length,
            source: LengthSource::StoredContentLength,
        });
    }
    content_range(headers).map(|range| DeclaredLength {
        length: range.len(),
        source: LengthSource::ContentRange,
    })
}

fn parse_u64_header(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}
