//! Exponential backoff with jitter, used by the streamable-HTTP driver's
//! reconnect logic.

use std::time::Duration;

use gateway_transport_traits::TransportError;
use serde::{Deserialize, Serialize};

/// Backoff configuration for a retried operation.
///
/// Defaults match the streamable driver's reconnect contract: 1 s initial
/// delay, doubling, capped at 30 s, at most 3 attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling applied to the computed delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay on each subsequent attempt.
    pub backoff_multiplier: f64,
    /// Fraction of the computed delay randomized in either direction, to
    /// avoid every reconnecting client retrying in lockstep.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Whether a transport failure is worth retrying.
///
/// Connection refusal, timeouts, DNS failure, and upstream 5xx responses are
/// retryable. HTTP 4xx and framing errors are not — retrying a malformed
/// request or a rejected one just repeats the failure.
pub fn is_retryable(err: &TransportError) -> bool {
    matches!(
        err,
        TransportError::ConnectionFailed(_)
            | TransportError::ConnectionLost(_)
            | TransportError::Timeout
            | TransportError::ConnectionTimeout { .. }
            | TransportError::RequestTimeout { .. }
            | TransportError::ReadTimeout { .. }
    ) || matches!(err, TransportError::Io(msg) if msg.contains("refused") || msg.contains("dns") || msg.contains("resolve"))
        || matches!(err, TransportError::NotAvailable(msg) if msg.contains("502") || msg.contains("503") || msg.contains("504"))
}

impl RetryPolicy {
    /// Compute the delay to wait before `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.base_delay;
        }

        let delay_ms =
            self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);

        let jitter = 1.0 + (fastrand::f64() - 0.5) * 2.0 * self.jitter_factor;
        let jittered_ms = (delay_ms * jitter).max(0.0);

        let capped_ms = jittered_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Whether another attempt should be made after `attempt` has failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_uses_base_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), policy.base_delay);
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let policy = RetryPolicy::default();
        let d = policy.delay_for(10);
        assert!(d <= policy.max_delay);
    }

    #[test]
    fn retries_stop_at_max_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(policy.max_attempts - 1));
        assert!(!policy.should_retry(policy.max_attempts));
    }

    #[test]
    fn connection_failures_are_retryable() {
        assert!(is_retryable(&TransportError::ConnectionFailed("refused".into())));
        assert!(is_retryable(&TransportError::Timeout));
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!is_retryable(&TransportError::ConfigurationError("bad id".into())));
        assert!(!is_retryable(&TransportError::ProtocolError("malformed".into())));
    }
}
