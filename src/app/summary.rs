//! End-of-run summary.

use std::path::PathBuf;

use refetch_core::{ResponseInfo, ResumableReader};
use serde::Serialize;

/// What a finished transfer produced.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FetchSummary {
    pub url: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub size: u64,
    pub resumes: u32,
    pub last_response: Option<ResponseInfo>,
}

impl FetchSummary {
    pub(crate) fn from_reader(reader: &ResumableReader, path: PathBuf, bytes: u64) -> Self {
        Self {
            url: reader.url().to_string(),
            path,
            bytes,
            size: reader.size(),
            resumes: reader.resumes(),
            last_response: reader.response_info(),
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
