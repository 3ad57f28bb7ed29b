//! Fetch retry policy.
//!
//! The fetch loop feeds every failed attempt into [`next_action`] and only
//! carries out the decision.

use std::fmt;
use std::time::Duration;

/// Delay before the second attempt; doubles for each attempt after that
pub const BASE_BACKOFF: Duration = Duration::from_millis(1000);

/// Why a single marketplace request did not yield a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Non-2xx response
    Status(u16),
    Timeout,
    Network(String),
    /// 2xx response whose body was not a search payload
    Decode(String),
}

impl FetchFailure {
    /// 403 and 503 are treated as anti-bot blocks
    pub fn is_blocked(&self) -> bool {
        matches!(self, FetchFailure::Status(403) | FetchFailure::Status(503))
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status(code) => write!(f, "HTTP {}", code),
            FetchFailure::Timeout => write!(f, "timed out"),
            FetchFailure::Network(msg) => write!(f, "network error: {}", msg),
            FetchFailure::Decode(msg) => write!(f, "undecodable payload: {}", msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAction {
    /// Sleep, then try again on the same route
    Retry(Duration),
    /// Hand the target to the browser bypass now
    Escalate,
    GiveUp,
}

/// `1000 ms × 2^(attempt − 1)`
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    BASE_BACKOFF * 2u32.pow(exponent)
}

/// Decide what follows failed attempt number `attempt` (1-based)
pub fn next_action(attempt: u32, max_attempts: u32, failure: &FetchFailure) -> FetchAction {
    if attempt > max_attempts {
        return FetchAction::GiveUp;
    }

    if failure.is_blocked() {
        return FetchAction::Escalate;
    }

    // The same body comes back on every retry.
    if matches!(failure, FetchFailure::Decode(_)) {
        return FetchAction::GiveUp;
    }

    FetchAction::Retry(backoff_delay(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_blocked_statuses_escalate_immediately() {
        assert_eq!(
            next_action(1, 3, &FetchFailure::Status(403)),
            FetchAction::Escalate
        );
        assert_eq!(
            next_action(2, 3, &FetchFailure::Status(503)),
            FetchAction::Escalate
        );
    }

    #[test]
    fn test_other_failures_back_off() {
        assert_eq!(
            next_action(1, 3, &FetchFailure::Timeout),
            FetchAction::Retry(Duration::from_millis(1000))
        );
        assert_eq!(
            next_action(2, 3, &FetchFailure::Status(500)),
            FetchAction::Retry(Duration::from_millis(2000))
        );
        assert_eq!(
            next_action(3, 3, &FetchFailure::Network("reset".into())),
            FetchAction::Retry(Duration::from_millis(4000))
        );
    }

    #[test]
    fn test_undecodable_body_gives_up_at_once() {
        assert_eq!(
            next_action(1, 3, &FetchFailure::Decode("expected value".into())),
            FetchAction::GiveUp
        );
    }

    #[test]
    fn test_gives_up_past_the_budget() {
        assert_eq!(next_action(4, 3, &FetchFailure::Timeout), FetchAction::GiveUp);
        assert_eq!(
            next_action(4, 3, &FetchFailure::Status(403)),
            FetchAction::GiveUp
        );
    }

    #[test]
    fn test_blocked_classification() {
        assert!(FetchFailure::Status(403).is_blocked());
        assert!(FetchFailure::Status(503).is_blocked());
        assert!(!FetchFailure::Status(429).is_blocked());
        assert!(!FetchFailure::Timeout.is_blocked());
    }
}
