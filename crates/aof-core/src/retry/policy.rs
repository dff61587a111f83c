use std::time::Duration;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// 5xx other than 503.
    Http5xx(u16),
    /// 200 with an empty body; the segment is not published yet.
    NotReady,
    /// Partial or garbled body.
    Malformed,
    /// Local cache write failed.
    Storage,
    /// The capture no longer accepts segments.
    Closed,
    /// Anything else (4xx, task failures).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Linear backoff: the wait before retry `n` is `n * step_delay`.
///
/// The spectator service answers 404 for segments it has not published yet,
/// so every remote error kind is retried; only local storage failures stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Backoff step.
    pub step_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            step_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after attempt `attempt` (1-based) failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        match kind {
            ErrorKind::Storage | ErrorKind::Closed => RetryDecision::NoRetry,
            ErrorKind::Timeout
            | ErrorKind::Throttled
            | ErrorKind::Connection
            | ErrorKind::Http5xx(_)
            | ErrorKind::NotReady
            | ErrorKind::Malformed
            | ErrorKind::Other => {
                RetryDecision::RetryAfter(self.step_delay.saturating_mul(attempt))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear_in_attempt() {
        let p = RetryPolicy::default();
        assert_eq!(
            p.decide(1, ErrorKind::Timeout),
            RetryDecision::RetryAfter(Duration::from_millis(2000))
        );
        assert_eq!(
            p.decide(2, ErrorKind::Other),
            RetryDecision::RetryAfter(Duration::from_millis(4000))
        );
        assert_eq!(
            p.decide(9, ErrorKind::NotReady),
            RetryDecision::RetryAfter(Duration::from_millis(18000))
        );
    }

    #[test]
    fn tenth_failure_is_final() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(10, ErrorKind::Timeout), RetryDecision::NoRetry);
        assert_eq!(p.decide(11, ErrorKind::Timeout), RetryDecision::NoRetry);
    }

    #[test]
    fn storage_errors_are_not_retried() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Storage), RetryDecision::NoRetry);
        assert_eq!(p.decide(1, ErrorKind::Closed), RetryDecision::NoRetry);
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy {
            max_attempts: 3,
            step_delay: Duration::from_millis(1),
        };
        assert!(matches!(
            p.decide(2, ErrorKind::Throttled),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.decide(3, ErrorKind::Throttled), RetryDecision::NoRetry);
    }
}
