//! Manager-level metrics (§4.10): per-transport counters plus a response-time
//! moving average, distinct from [`gateway_transport_traits::AtomicMetrics`]'s
//! per-driver alpha=0.1 EMA — this one follows the manager's own simpler
//! recurrence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gateway_transport_traits::TransportType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of one transport type's counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportTypeMetrics {
    /// Connections opened over the manager's lifetime.
    pub connections_total: u64,
    /// Connections currently open.
    pub active_connections: i64,
    /// Messages sent or received over the manager's lifetime.
    pub messages_total: u64,
    /// Failed sends/receives over the manager's lifetime.
    pub errors_total: u64,
    /// Moving average of response time, in milliseconds.
    pub response_time_avg_ms: f64,
    /// Milliseconds since the last send/receive, if any activity has
    /// occurred yet.
    pub last_activity_ms_ago: Option<u64>,
}

#[derive(Default)]
struct Counters {
    connections_total: AtomicU64,
    active_connections: AtomicI64,
    messages_total: AtomicU64,
    errors_total: AtomicU64,
    response_time_avg_ms: Mutex<Option<f64>>,
    last_activity: Mutex<Option<Instant>>,
}

impl Counters {
    fn snapshot(&self) -> TransportTypeMetrics {
        TransportTypeMetrics {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            messages_total: self.messages_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            response_time_avg_ms: self.response_time_avg_ms.lock().unwrap().unwrap_or(0.0),
            last_activity_ms_ago: self
                .last_activity
                .lock()
                .unwrap()
                .map(|t| t.elapsed().as_millis() as u64),
        }
    }
}

/// Per-transport-type counters and gauges, tracked by the transport manager.
///
/// Each type is tracked independently so `GetMetrics` can answer "how is the
/// WebSocket fleet doing" without the SSE fleet's numbers drowning it out.
#[derive(Default)]
pub struct ManagerMetrics {
    by_type: RwLock<HashMap<TransportType, Arc<Counters>>>,
}

impl std::fmt::Debug for ManagerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerMetrics").finish_non_exhaustive()
    }
}

impl ManagerMetrics {
    /// Construct an empty metrics table; counters are created lazily per type
    /// on first use.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, transport_type: TransportType) -> Arc<Counters> {
        if let Some(counters) = self.by_type.read().get(&transport_type) {
            return Arc::clone(counters);
        }
        Arc::clone(self.by_type.write().entry(transport_type).or_default())
    }

    /// Record that a connection of `transport_type` was opened.
    pub fn record_connection_opened(&self, transport_type: TransportType) {
        let counters = self.entry(transport_type);
        counters.connections_total.fetch_add(1, Ordering::Relaxed);
        counters.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a connection of `transport_type` was closed.
    pub fn record_connection_closed(&self, transport_type: TransportType) {
        let counters = self.entry(transport_type);
        counters.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a send or receive: updates the message count, the response-time
    /// moving average (`new = (old + sample) / 2`, seeded by the first
    /// sample), the error count on failure, and the activity clock.
    pub fn record_message(&self, transport_type: TransportType, duration: Duration, failed: bool) {
        let counters = self.entry(transport_type);
        counters.messages_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            counters.errors_total.fetch_add(1, Ordering::Relaxed);
        }

        let sample_ms = duration.as_secs_f64() * 1000.0;
        let mut avg = counters.response_time_avg_ms.lock().unwrap();
        *avg = Some(match *avg {
            Some(old) => (old + sample_ms) / 2.0,
            None => sample_ms,
        });
        drop(avg);

        *counters.last_activity.lock().unwrap() = Some(Instant::now());
    }

    /// A snapshot of every transport type tracked so far.
    pub fn snapshot(&self) -> HashMap<TransportType, TransportTypeMetrics> {
        self.by_type
            .read()
            .iter()
            .map(|(ty, counters)| (*ty, counters.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds_the_average() {
        let metrics = ManagerMetrics::new();
        metrics.record_message(TransportType::Http, Duration::from_millis(100), false);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot[&TransportType::Http].response_time_avg_ms, 100.0);
    }

    #[test]
    fn subsequent_samples_average_with_the_prior_value() {
        let metrics = ManagerMetrics::new();
        metrics.record_message(TransportType::Http, Duration::from_millis(100), false);
        metrics.record_message(TransportType::Http, Duration::from_millis(200), false);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot[&TransportType::Http].response_time_avg_ms, 150.0);
    }

    #[test]
    fn failed_messages_increment_errors() {
        let metrics = ManagerMetrics::new();
        metrics.record_message(TransportType::WebSocket, Duration::from_millis(10), true);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot[&TransportType::WebSocket].errors_total, 1);
        assert_eq!(snapshot[&TransportType::WebSocket].messages_total, 1);
    }

    #[test]
    fn connection_lifecycle_moves_the_active_gauge() {
        let metrics = ManagerMetrics::new();
        metrics.record_connection_opened(TransportType::Sse);
        metrics.record_connection_opened(TransportType::Sse);
        metrics.record_connection_closed(TransportType::Sse);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot[&TransportType::Sse].connections_total, 2);
        assert_eq!(snapshot[&TransportType::Sse].active_connections, 1);
    }
}
