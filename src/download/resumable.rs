//! Resumable response reader.
//!
//! [`ResumableReader`] presents an HTTP response body as one continuous byte
//! stream. When the connection fails before the declared number of bytes has
//! arrived, it re-issues the request with `Range: bytes=<count>-` and keeps
//! reading from the new response, after checking that the server still
//! describes a resource of the same size.
//!
//! A full drain yields exactly [`size`](ResumableReader::size) bytes followed
//! by `Ok(0)`, or an error. It never ends short without saying so.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use refetch_core::download::{FetchRequest, HttpClient, ResumableReader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = FetchRequest::get("https://example.com/large.bin")?;
//! let reader = ResumableReader::open(Arc::new(HttpClient::new()), request).await?;
//! let mut body = Vec::new();
//! reader.read_to_end(&mut body).await?;
//! assert_eq!(body.len() as u64, reader.size());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::constants::{BODY_SNIPPET_LIMIT, COPY_BUFFER_SIZE, MAX_EMPTY_RESUMES};
use super::length::{ContentRange, LengthSource, content_length, content_range, declared_length};
use super::{DownloadError, FetchRequest, Transport};

/// A source of a monotonically growing byte count, sampled by progress
/// reporters without taking part in the read path.
pub trait Counter {
    /// Bytes counted so far.
    fn count(&self) -> u64;
}

/// Header snapshot of the response currently being read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseInfo {
    /// HTTP status code (200 for the first epoch, 206 after a ranged resume).
    pub status: u16,
    /// `Content-Length` as sent by the server, if any.
    pub content_length: Option<u64>,
    /// Bytes this response is expected to deliver.
    pub length: u64,
    /// Header `length` was resolved from.
    pub length_source: LengthSource,
    /// Parsed `Content-Range`, if any.
    pub content_range: Option<ContentRange>,
    /// Offset of the first body byte within the whole resource.
    pub offset: u64,
    /// Zero-based epoch: 0 for the initial response, incremented per resume.
    pub epoch: u32,
}

/// Outcome of one read against a live body.
enum ChunkRead {
    Data(usize),
    End,
    Failed(reqwest::Error),
    Interrupted,
}

impl ChunkRead {
    fn len(&self) -> usize {
        match self {
            Self::Data(n) => *n,
            Self::End | Self::Failed(_) | Self::Interrupted => 0,
        }
    }
}

/// The body of one epoch's response.
///
/// Reqwest yields whole chunks; the unread tail of the last chunk is kept
/// so callers may read with buffers of any size.
struct LiveBody {
    state: tokio::sync::Mutex<BodyState>,
}

struct BodyState {
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
    pending: Bytes,
    finished: bool,
}

impl LiveBody {
    fn new(response: reqwest::Response) -> Self {
        Self {
            state: tokio::sync::Mutex::new(BodyState {
                stream: response.bytes_stream().boxed(),
                pending: Bytes::new(),
                finished: false,
            }),
        }
    }

    async fn read(&self, buf: &mut [u8], cancel: &CancellationToken) -> ChunkRead {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if buf.is_empty() {
            return ChunkRead::Data(0);
        }

        while state.pending.is_empty() {
            if state.finished {
                return ChunkRead::End;
            }
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return ChunkRead::Interrupted,
                next = state.stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => state.pending = chunk,
                Some(Err(error)) => {
                    state.finished = true;
                    return ChunkRead::Failed(error);
                }
                None => {
                    state.finished = true;
                    return ChunkRead::End;
                }
            }
        }

        let n = buf.len().min(state.pending.len());
        buf[..n].copy_from_slice(&state.pending.split_to(n));
        ChunkRead::Data(n)
    }
}

/// Reads a response body to completion, resuming with `Range` requests
/// after connection failures.
///
/// # Concurrency
///
/// Reads must be sequential. [`close`](Self::close), [`count`](Self::count)
/// and [`size`](Self::size) may be called concurrently from other tasks
/// (share the reader through an `Arc`). The live response is held behind a
/// lock only long enough to snapshot or swap it; body I/O happens outside it.
pub struct ResumableReader {
    client: Arc<dyn Transport>,
    request: Mutex<FetchRequest>,
    url: String,
    cancel: CancellationToken,
    count: AtomicU64,
    size: AtomicU64,
    epochs: AtomicU32,
    closed: AtomicBool,
    current: Mutex<Option<Arc<LiveBody>>>,
    info: Mutex<Option<ResponseInfo>>,
}

impl fmt::Debug for ResumableReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumableReader")
            .field("url", &self.url)
            .field("count", &self.count())
            .field("size", &self.size())
            .field("epochs", &self.epochs())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ResumableReader {
    /// Performs the initial request and returns a reader positioned at byte 0.
    ///
    /// Any `Range` header already on `request` is removed: the first response
    /// must be a complete `200 OK` whose length can be determined.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::BadResponseStatus`] if the status is not 200
    /// - [`DownloadError::MissingSize`] if no header gives the body length
    /// - [`DownloadError::Cancelled`] if the request's token is triggered
    /// - transport errors from `client`
    #[instrument(skip(client, request), fields(url = %request.url()))]
    pub async fn open(
        client: Arc<dyn Transport>,
        request: FetchRequest,
    ) -> Result<Self, DownloadError> {
        let reader = Self {
            client,
            url: request.url().to_string(),
            cancel: request.cancellation().clone(),
            request: Mutex::new(request),
            count: AtomicU64::new(0),
            size: AtomicU64::new(0),
            epochs: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            current: Mutex::new(None),
            info: Mutex::new(None),
        };
        reader.restart().await?;
        info!(size = reader.size(), "response opened");
        Ok(reader)
    }

    /// Reads the next bytes of the body into `buf`.
    ///
    /// Returns `Ok(0)` only once all [`size`](Self::size) bytes have been
    /// delivered (or when `buf` is empty). A connection failure with bytes
    /// outstanding triggers a resume and the read continues on the new
    /// response.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Closed`] after [`close`](Self::close) or a failed resume
    /// - [`DownloadError::ReadBeyondExpectedEnd`] if the server sent too many bytes
    /// - [`DownloadError::Cancelled`] if the token fired with bytes outstanding
    /// - [`DownloadError::ResumeStalled`] if resumes keep producing no data
    /// - any error from the resume itself
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize, DownloadError> {
        let mut empty_resumes: u32 = 0;

        loop {
            let body = self.live_body()?;
            let outcome = body.read(buf, &self.cancel).await;
            drop(body);

            let n = outcome.len() as u64;
            let count = self.count.fetch_add(n, Ordering::SeqCst) + n;
            let size = self.size();

            if count == size {
                return match outcome {
                    ChunkRead::Data(n) => Ok(n),
                    ChunkRead::End => Ok(0),
                    ChunkRead::Failed(source) => Err(DownloadError::transport(&self.url, source)),
                    // Every byte already arrived; only the trailing end-of-stream was pending.
                    ChunkRead::Interrupted => Ok(0),
                };
            }
            if count > size {
                warn!(url = %self.url, count, size, "read beyond the expected end of the response body");
                return Err(DownloadError::read_beyond_expected_end(&self.url, count, size));
            }

            match outcome {
                ChunkRead::Data(n) => return Ok(n),
                ChunkRead::Interrupted => return Err(DownloadError::cancelled(&self.url)),
                _ if self.cancel.is_cancelled() => {
                    debug!(url = %self.url, count, size, "cancelled with bytes outstanding");
                    return Err(DownloadError::cancelled(&self.url));
                }
                ChunkRead::End => {
                    debug!(url = %self.url, count, size, "body ended early");
                }
                ChunkRead::Failed(error) => {
                    warn!(url = %self.url, count, size, error = %error, "body read failed");
                }
            }

            if empty_resumes == MAX_EMPTY_RESUMES {
                warn!(url = %self.url, attempts = empty_resumes, "resumes keep returning no data");
                return Err(DownloadError::resume_stalled(&self.url, empty_resumes));
            }
            empty_resumes += 1;
            self.restart().await?;
        }
    }

    /// Reads until end-of-stream, appending to `out`.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read). Bytes read before the error stay in `out`.
    pub async fn read_to_end(&self, out: &mut Vec<u8>) -> Result<usize, DownloadError> {
        let mut buf = vec![0_u8; COPY_BUFFER_SIZE];
        let mut total = 0;
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&buf[..n]);
            total += n;
        }
    }

    /// Drains the body into a newly created file at `path`.
    ///
    /// The partial file is removed if the transfer fails.
    ///
    /// # Errors
    ///
    /// [`DownloadError::Io`] for file system failures, otherwise the same
    /// errors as [`read`](Self::read).
    #[instrument(skip(self), fields(url = %self.url, path = %path.display()))]
    pub async fn save_to_file(&self, path: &Path) -> Result<u64, DownloadError> {
        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        let result = self.copy_into(file, path).await;
        if result.is_err() {
            debug!("removing partial file after error");
            let _ = tokio::fs::remove_file(path).await;
        }
        result
    }

    async fn copy_into(&self, file: File, path: &Path) -> Result<u64, DownloadError> {
        let mut writer = BufWriter::new(file);
        let mut buf = vec![0_u8; COPY_BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer
                .write_all(&buf[..n])
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            written += n as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        info!(bytes = written, resumes = self.resumes(), "body saved");
        Ok(written)
    }

    /// Releases the live response. Idempotent.
    ///
    /// A read already in flight finishes its current chunk; every later
    /// read fails with [`DownloadError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.release_current() {
            debug!(url = %self.url, count = self.count(), "response closed");
        }
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Bytes delivered to the caller so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// Total number of bytes the body is expected to contain.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    /// Returns true once every expected byte has been delivered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.count() == self.size()
    }

    /// Number of responses opened so far (the initial one included).
    #[must_use]
    pub fn epochs(&self) -> u32 {
        self.epochs.load(Ordering::SeqCst)
    }

    /// Number of resumes performed so far.
    #[must_use]
    pub fn resumes(&self) -> u32 {
        self.epochs().saturating_sub(1)
    }

    /// URL being read.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Header snapshot of the most recently opened response.
    #[must_use]
    pub fn response_info(&self) -> Option<ResponseInfo> {
        self.info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Snapshot of the request as it will be (or was last) sent.
    #[must_use]
    pub fn request(&self) -> FetchRequest {
        self.request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn live_body(&self) -> Result<Arc<LiveBody>, DownloadError> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| DownloadError::closed(&self.url))
    }

    /// Takes the live body out of its slot; it is dropped outside the lock.
    fn release_current(&self) -> bool {
        let body = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        body.is_some()
    }

    /// Opens the next epoch at the current offset.
    #[instrument(level = "debug", skip(self), fields(url = %self.url, offset = self.count()))]
    async fn restart(&self) -> Result<(), DownloadError> {
        self.release_current();

        let offset = self.count();
        let request = {
            let mut request = self.request.lock().unwrap_or_else(PoisonError::into_inner);
            request.set_range_offset(offset)?;
            request.clone()
        };

        let response = self.client.execute(&request).await?;

        let status = response.status();
        let expected = if offset > 0 {
            StatusCode::PARTIAL_CONTENT
        } else {
            StatusCode::OK
        };
        if status != expected {
            warn!(
                status = status.as_u16(),
                expected = expected.as_u16(),
                "bad response status"
            );
            let body = body_snippet(response, &self.cancel).await;
            return Err(DownloadError::bad_response_status(
                &self.url,
                status.as_u16(),
                body,
            ));
        }

        let headers = response.headers();
        let declared =
            declared_length(headers).ok_or_else(|| DownloadError::missing_size(&self.url))?;
        let range = content_range(headers);
        if offset > 0
            && let Some(range) = range
            && range.first != offset
        {
            warn!(requested = offset, actual = range.first, "server resumed at the wrong byte");
            return Err(DownloadError::range_start_mismatch(
                &self.url,
                offset,
                range.first,
            ));
        }

        let total = offset.saturating_add(declared.length);
        let epoch = self.epochs();
        if epoch == 0 {
            self.size.store(total, Ordering::SeqCst);
        } else {
            let size = self.size();
            if total != size {
                warn!(expected = size, actual = total, "length changed across resume");
                return Err(DownloadError::length_mismatch(&self.url, size, total));
            }
        }

        let info = ResponseInfo {
            status: status.as_u16(),
            content_length: content_length(headers),
            length: declared.length,
            length_source: declared.source,
            content_range: range,
            offset,
            epoch,
        };

        let body = Arc::new(LiveBody::new(response));
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if self.is_closed() {
                debug!("reader closed during resume, dropping response");
                return Err(DownloadError::closed(&self.url));
            }
            *current = Some(body);
        }
        self.epochs.fetch_add(1, Ordering::SeqCst);
        *self.info.lock().unwrap_or_else(PoisonError::into_inner) = Some(info);

        if epoch > 0 {
            info!(offset, remaining = declared.length, epoch, "response resumed");
        }
        Ok(())
    }
}

impl Counter for ResumableReader {
    fn count(&self) -> u64 {
        ResumableReader::count(self)
    }
}

/// Reads the leading part of an error response body for diagnostics.
///
/// Stops early on cancellation so a stalled error body cannot hold the caller.
async fn body_snippet(response: reqwest::Response, cancel: &CancellationToken) -> String {
    let mut stream = response.bytes_stream();
    let mut collected = Vec::new();
    while collected.len() < BODY_SNIPPET_LIMIT {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(chunk)) => collected.extend_from_slice(&chunk),
            Some(Err(_)) | None => break,
        }
    }
    collected.truncate(BODY_SNIPPET_LIMIT);
    String::from_utf8_lossy(&collected).trim().to_string()
}
