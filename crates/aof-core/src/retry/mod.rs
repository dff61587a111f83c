//! Retry and backoff policy for spectator requests.
//!
//! Error classification (timeouts, throttling, connection failures, empty
//! bodies) plus the linear backoff used for segment downloads, so the
//! downloader and the spectator client share one policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryOutcome};
