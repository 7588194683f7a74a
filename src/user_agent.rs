//! User-Agent string sent by the HTTP client.

/// Default User-Agent for requests (identifies the tool and its version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("refetch/{version} (resumable-fetch)")
}
