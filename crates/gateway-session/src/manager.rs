//! The session manager: session lifecycle, event log, and idle eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gateway_transport_traits::TransportType;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use chrono::{DateTime, Utc};

use crate::error::{SessionError, SessionResult};
use crate::event::{Event, EventFilter, EventRing, EventType, REPLAY_RING_CAP, SESSION_EVENT_CAP};
use crate::session::{DEFAULT_SESSION_TIMEOUT, Session, SessionId};

/// How often the background sweep checks for idle sessions.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A point-in-time snapshot of the manager's counters.
#[derive(Debug, Clone, Default)]
pub struct SessionMetrics {
    /// Sessions currently tracked (open or not yet swept).
    pub active_sessions: u64,
    /// Sessions created over the manager's lifetime.
    pub total_created: u64,
    /// Sessions explicitly closed over the manager's lifetime.
    pub total_closed: u64,
    /// Sessions evicted by the idle sweep over the manager's lifetime.
    pub total_expired: u64,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    closed: AtomicU64,
    expired: AtomicU64,
}

/// Tracks every open session and its recent event history.
///
/// Internally this is a single reader-writer lock over the session table
/// (plus a second, independent lock over the process-wide SSE replay ring) —
/// deliberately one coarse lock per table rather than per-session locking,
/// since session operations are infrequent relative to message throughput,
/// which flows through the transport drivers, not through this manager.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Session>>,
    event_rings: RwLock<HashMap<SessionId, EventRing>>,
    replay_ring: RwLock<EventRing>,
    timeout: Duration,
    counters: Counters,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Construct a manager with the given idle timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            event_rings: RwLock::new(HashMap::new()),
            replay_ring: RwLock::new(EventRing::new(REPLAY_RING_CAP)),
            timeout,
            counters: Counters::default(),
        }
    }

    /// Open a new session over `transport_type`, seeding its event log with
    /// a connect event.
    pub async fn create_session(&self, transport_type: TransportType) -> Session {
        let session = Session::new(transport_type);
        let id = session.id.clone();
        self.sessions.write().await.insert(id.clone(), session.clone());
        self.event_rings.write().await.insert(id.clone(), EventRing::new(SESSION_EVENT_CAP));
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        info!(session_id = %session.id, transport = %session.transport_type, "session created");
        let _ = self
            .add_event(&id, EventType::Connect, serde_json::json!({"transport": session.transport_type.to_string()}))
            .await;
        session
    }

    /// Look up a session by id.
    pub async fn get_session(&self, id: &SessionId) -> SessionResult<Session> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if session.closed {
            return Err(SessionError::Closed(id.to_string()));
        }
        if session.is_expired(self.timeout) {
            return Err(SessionError::Expired(id.to_string()));
        }
        Ok(session.clone())
    }

    /// Apply an in-place update to a session, e.g. to set `user_id` or
    /// negotiated-version metadata.
    pub async fn update_session<F>(&self, id: &SessionId, f: F) -> SessionResult<Session>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        f(session);
        Ok(session.clone())
    }

    /// Reset a session's idle clock.
    pub async fn touch_session(&self, id: &SessionId) -> SessionResult<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.touch();
        Ok(())
    }

    /// Explicitly close a session, appending a disconnect event
    /// (`reason=manual_close`). Idempotent: closing an already-closed
    /// session succeeds without raising or re-journaling.
    pub async fn close_session(&self, id: &SessionId) -> SessionResult<()> {
        let was_already_closed = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            let was_closed = session.closed;
            if !was_closed {
                session.closed = true;
                self.counters.closed.fetch_add(1, Ordering::Relaxed);
                debug!(session_id = %id, "session closed");
            }
            was_closed
        };
        if !was_already_closed {
            let _ = self.add_event(id, EventType::Disconnect, serde_json::json!({"reason": "manual_close"})).await;
        }
        Ok(())
    }

    /// Record an event against a session and mirror it into the process-wide
    /// replay ring.
    pub async fn add_event(&self, id: &SessionId, event_type: EventType, data: Value) -> SessionResult<Event> {
        {
            let sessions = self.sessions.read().await;
            sessions
                .get(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        }
        let event = Event::new(id.clone(), event_type, data);
        {
            let mut rings = self.event_rings.write().await;
            rings.entry(id.clone()).or_insert_with(|| EventRing::new(SESSION_EVENT_CAP)).push(event.clone());
        }
        self.replay_ring.write().await.push(event.clone());
        Ok(event)
    }

    /// Events for a specific session, optionally only those newer than
    /// `after` (a prior `Last-Event-ID`).
    pub async fn get_events(&self, id: &SessionId, after: Option<u64>) -> SessionResult<Vec<Event>> {
        let rings = self.event_rings.read().await;
        let ring = rings.get(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(match after {
            Some(seq) => ring.since(seq),
            None => ring.all(),
        })
    }

    /// Events for a specific session recorded at or after `since` —
    /// `GetEventsSince(timestamp)`, used by the streamable driver's
    /// reconnect replay when it only has a wall-clock cutoff, not a prior
    /// `seq`.
    pub async fn get_events_since(&self, id: &SessionId, since: DateTime<Utc>) -> SessionResult<Vec<Event>> {
        let rings = self.event_rings.read().await;
        let ring = rings.get(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(ring.since_timestamp(since))
    }

    /// The `n` most recent events for a specific session — `GetLatestEvents(n)`.
    pub async fn get_latest_events(&self, id: &SessionId, n: usize) -> SessionResult<Vec<Event>> {
        let rings = self.event_rings.read().await;
        let ring = rings.get(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(ring.latest(n))
    }

    /// Events for a specific session matching an arbitrary [`EventFilter`]
    /// (event types, time window, data predicate).
    pub async fn get_events_filtered(&self, id: &SessionId, filter: &EventFilter) -> SessionResult<Vec<Event>> {
        let rings = self.event_rings.read().await;
        let ring = rings.get(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(ring.matching(filter))
    }

    /// Replay from the process-wide ring, independent of which session
    /// originated each event — used when an SSE client reconnects with a
    /// `Last-Event-ID` but the gateway can no longer resolve its session.
    pub async fn replay_since(&self, after: u64) -> Vec<Event> {
        self.replay_ring.read().await.since(after)
    }

    /// All sessions that are open and not expired.
    pub async fn get_active_sessions(&self) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|s| !s.closed && !s.is_expired(self.timeout))
            .cloned()
            .collect()
    }

    /// Sessions belonging to a given user/principal.
    pub async fn get_sessions_by_user(&self, user_id: &str) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|s| s.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }

    /// Sessions opened over a given transport dialect.
    pub async fn get_sessions_by_transport(&self, transport_type: TransportType) -> Vec<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|s| s.transport_type == transport_type)
            .cloned()
            .collect()
    }

    /// Sweep sessions once, evicting any that are idle past `timeout` or
    /// closed and past their linger window. Each eviction is journaled as a
    /// disconnect event (`reason=expired`) before the session and its event
    /// ring are purged. Returns the number evicted.
    pub async fn sweep(&self) -> usize {
        let expired_ids: Vec<SessionId> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|s| s.is_expired(self.timeout))
                .map(|s| s.id.clone())
                .collect()
        };
        if expired_ids.is_empty() {
            return 0;
        }
        for id in &expired_ids {
            let _ = self.add_event(id, EventType::Disconnect, serde_json::json!({"reason": "expired"})).await;
        }
        let mut sessions = self.sessions.write().await;
        let mut rings = self.event_rings.write().await;
        for id in &expired_ids {
            sessions.remove(id);
            rings.remove(id);
            self.counters.expired.fetch_add(1, Ordering::Relaxed);
            warn!(session_id = %id, "session expired and evicted");
        }
        expired_ids.len()
    }

    /// Run the idle-sweep loop until cancelled. Intended to be spawned once
    /// at startup: `tokio::spawn(manager.clone().sweep_loop(interval))`.
    pub async fn sweep_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let evicted = self.sweep().await;
            if evicted > 0 {
                debug!(evicted, "idle sweep evicted sessions");
            }
        }
    }

    /// A snapshot of the manager's lifetime counters.
    pub async fn metrics(&self) -> SessionMetrics {
        SessionMetrics {
            active_sessions: self.sessions.read().await.len() as u64,
            total_created: self.counters.created.load(Ordering::Relaxed),
            total_closed: self.counters.closed.load(Ordering::Relaxed),
            total_expired: self.counters.expired.load(Ordering::Relaxed),
        }
    }

    /// Close every session, for a graceful shutdown.
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut() {
            session.closed = true;
        }
        info!(count = sessions.len(), "session manager shutting down");
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let mgr = SessionManager::default();
        let session = mgr.create_session(TransportType::Sse).await;
        let fetched = mgr.get_session(&session.id).await.unwrap();
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn closed_session_is_not_gettable() {
        let mgr = SessionManager::default();
        let session = mgr.create_session(TransportType::Http).await;
        mgr.close_session(&session.id).await.unwrap();
        let err = mgr.get_session(&session.id).await.unwrap_err();
        assert_eq!(err, SessionError::Closed(session.id.to_string()));
    }

    #[tokio::test]
    async fn missing_session_is_not_found() {
        let mgr = SessionManager::default();
        let bogus = SessionId::from_str("mcp-bogus").unwrap();
        assert!(matches!(mgr.get_session(&bogus).await, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn sweep_evicts_idle_sessions() {
        let mgr = SessionManager::new(Duration::from_millis(1));
        let session = mgr.create_session(TransportType::WebSocket).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let evicted = mgr.sweep().await;
        assert_eq!(evicted, 1);
        assert!(mgr.get_session(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn events_replay_since_last_seen_seq() {
        let mgr = SessionManager::default();
        let session = mgr.create_session(TransportType::Sse).await;
        let e1 = mgr.add_event(&session.id, EventType::Message, Value::from(1)).await.unwrap();
        mgr.add_event(&session.id, EventType::Message, Value::from(2)).await.unwrap();
        let replay = mgr.get_events(&session.id, Some(e1.seq)).await.unwrap();
        assert_eq!(replay.len(), 1);
    }

    #[tokio::test]
    async fn metrics_reflect_created_and_closed_counts() {
        let mgr = SessionManager::default();
        let session = mgr.create_session(TransportType::Stdio).await;
        mgr.close_session(&session.id).await.unwrap();
        let metrics = mgr.metrics().await;
        assert_eq!(metrics.total_created, 1);
        assert_eq!(metrics.total_closed, 1);
    }

    #[tokio::test]
    async fn create_session_seeds_a_connect_event() {
        let mgr = SessionManager::default();
        let session = mgr.create_session(TransportType::Http).await;
        let events = mgr.get_events(&session.id, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Connect);
    }

    #[tokio::test]
    async fn close_session_appends_a_disconnect_event() {
        let mgr = SessionManager::default();
        let session = mgr.create_session(TransportType::Http).await;
        mgr.close_session(&session.id).await.unwrap();
        let events = mgr.get_events(&session.id, None).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, EventType::Disconnect);
        assert_eq!(events[1].data["reason"], "manual_close");
    }

    #[tokio::test]
    async fn closing_twice_does_not_double_journal() {
        let mgr = SessionManager::default();
        let session = mgr.create_session(TransportType::Http).await;
        mgr.close_session(&session.id).await.unwrap();
        mgr.close_session(&session.id).await.unwrap();
        let events = mgr.get_events(&session.id, None).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn sweep_closed_session_waits_out_the_linger_window() {
        let mgr = SessionManager::new(Duration::from_secs(600));
        let session = mgr.create_session(TransportType::Http).await;
        mgr.close_session(&session.id).await.unwrap();
        assert_eq!(mgr.sweep().await, 0);
    }

    #[tokio::test]
    async fn sweep_journals_a_disconnect_before_evicting() {
        let mgr = SessionManager::new(Duration::from_millis(1));
        let session = mgr.create_session(TransportType::Http).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(mgr.sweep().await, 1);
        let replayed = mgr.replay_since(0).await;
        let last = replayed.iter().filter(|e| e.session_id == session.id).last().unwrap();
        assert_eq!(last.event_type, EventType::Disconnect);
        assert_eq!(last.data["reason"], "expired");
    }
}
