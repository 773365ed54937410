//! A reference [`RateLimiter`]: a fixed-window counter per client key, in the
//! spirit of the token-bucket limiter `turbomcp-auth` keeps for its own
//! endpoints, just simple enough to be the composition root's zero-config
//! default rather than a tunable policy engine.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use gateway_server::{RateLimitDecision, RateLimiter};
use parking_lot::Mutex;

struct Window {
    started_at: Instant,
    count: u32,
}

/// Allows up to `limit` requests per `window` per client key, tracked with a
/// plain fixed-window counter (no smoothing at the window boundary — good
/// enough for a reference default, not for precise traffic shaping).
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<HashMap<String, Window>>,
}

impl FixedWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, state: Mutex::new(HashMap::new()) }
    }

    /// A permissive default: 600 requests/minute per client key.
    pub fn permissive() -> Self {
        Self::new(600, Duration::from_secs(60))
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check<'a>(&'a self, client_key: &'a str) -> Pin<Box<dyn Future<Output = RateLimitDecision> + Send + 'a>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut state = self.state.lock();
            let window = state.entry(client_key.to_string()).or_insert_with(|| Window { started_at: now, count: 0 });

            if now.duration_since(window.started_at) >= self.window {
                window.started_at = now;
                window.count = 0;
            }

            if window.count >= self.limit {
                let retry_after = self.window.saturating_sub(now.duration_since(window.started_at));
                return RateLimitDecision::Reject { retry_after };
            }

            window.count += 1;
            RateLimitDecision::Allow
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_requests_under_the_limit() {
        let limiter = FixedWindowRateLimiter::new(2, Duration::from_secs(60));
        assert_eq!(limiter.check("alice").await, RateLimitDecision::Allow);
        assert_eq!(limiter.check("alice").await, RateLimitDecision::Allow);
    }

    #[tokio::test]
    async fn rejects_once_the_limit_is_exhausted() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        assert_eq!(limiter.check("alice").await, RateLimitDecision::Allow);
        assert!(matches!(limiter.check("alice").await, RateLimitDecision::Reject { .. }));
    }

    #[tokio::test]
    async fn tracks_separate_windows_per_client_key() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        assert_eq!(limiter.check("alice").await, RateLimitDecision::Allow);
        assert_eq!(limiter.check("bob").await, RateLimitDecision::Allow);
    }
}
