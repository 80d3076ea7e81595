use std::time::Duration;

/// Strategy for re-issuing operations after a transient store failure.
///
/// `Unbounded` reproduces the documented default: retry the identical
/// operation forever, with no delay. A persistently failing transient
/// condition therefore stalls the calling worker indefinitely; the
/// transient-retry counter exists to surface how often this happens.
///
/// `Bounded` is the swappable alternative: at most `max_attempts` retries,
/// sleeping `backoff` scaled by the failure count between attempts, after
/// which the last transient error propagates.
#[derive(Debug, Clone)]
pub enum RetryPolicy {
    Unbounded,
    Bounded {
        max_attempts: u32,
        backoff: Duration,
    },
}

impl RetryPolicy {
    /// Whether another attempt should be made after `failures` transient
    /// failures so far.
    pub fn should_retry(&self, failures: u32) -> bool {
        match self {
            RetryPolicy::Unbounded => true,
            RetryPolicy::Bounded { max_attempts, .. } => failures <= *max_attempts,
        }
    }

    /// Delay to wait before the next attempt, if any.
    pub fn delay(&self, failures: u32) -> Option<Duration> {
        match self {
            RetryPolicy::Unbounded => None,
            RetryPolicy::Bounded { backoff, .. } => Some(backoff.saturating_mul(failures)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Unbounded
    }
}
