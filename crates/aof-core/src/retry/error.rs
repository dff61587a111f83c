//! Spectator request error type for retry classification.

use thiserror::Error;

/// Error returned by a single spectator request (metadata poll or segment fetch).
/// Used so we can classify and decide retries before converting to anyhow.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a status other than 200.
    #[error("HTTP {0}")]
    Http(u32),
    /// HTTP 200 with an empty body: the segment is not available yet.
    #[error("not ready (empty body)")]
    NotReady,
    /// Body could not be parsed (partial or garbled JSON).
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Writing the segment to the local cache failed. Not retried.
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
    /// The blocking request task panicked or was cancelled.
    #[error("request task failed: {0}")]
    Task(String),
    /// A reported segment id does not fit a container (garbled chunk info).
    #[error("segment id {0} out of range")]
    IdOutOfRange(i64),
    /// The capture was finalized while this download was still running.
    #[error("capture already finalized")]
    Closed,
}
