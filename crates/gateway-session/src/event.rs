//! Session events and the bounded ring buffers that hold them.
//!
//! Each session keeps its own capped ring of recent events (for SSE
//! `Last-Event-ID` replay scoped to that connection); the manager separately
//! keeps one process-wide ring so a reconnecting SSE client can be served
//! even if the manager has since rotated the originating session's own ring.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::session::SessionId;

/// Per-session event ring capacity.
pub const SESSION_EVENT_CAP: usize = 1000;

/// Process-wide SSE replay ring capacity.
pub const REPLAY_RING_CAP: usize = 1000;

static NEXT_EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// What kind of occurrence an [`Event`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A session (or driver) became reachable.
    Connect,
    /// A session (or driver) was torn down, cleanly or by eviction.
    Disconnect,
    /// An inbound or outbound protocol message.
    Message,
    /// A driver-reported failure worth surfacing in the event history.
    Error,
    /// Anything that doesn't fit the other kinds.
    Custom,
}

/// A single event recorded against a session, replayable via SSE
/// `Last-Event-ID`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Identifies this event uniquely, independent of the process-lifetime
    /// `seq` counter (stable across a process restart, unlike `seq`).
    pub id: Uuid,
    /// Monotonically increasing id, unique within the process's lifetime.
    /// This is the value sent as the SSE `id:` field.
    pub seq: u64,
    /// The session this event was recorded against.
    pub session_id: SessionId,
    /// What kind of occurrence this event records.
    pub event_type: EventType,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// The event's payload (typically the JSON-encoded outbound message).
    pub data: Value,
}

impl Event {
    /// Construct an event for `session_id`, assigning the next sequence
    /// number and a fresh id/timestamp.
    pub fn new(session_id: SessionId, event_type: EventType, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq: NEXT_EVENT_SEQ.fetch_add(1, Ordering::Relaxed),
            session_id,
            event_type,
            timestamp: Utc::now(),
            data,
        }
    }
}

/// A query over a session's (or the process-wide replay ring's) event
/// history, richer than a plain `since(seq)` — event type, time window, and
/// an arbitrary predicate over the payload.
#[derive(Default)]
pub struct EventFilter {
    /// Only events of these types, if set.
    pub event_types: Option<Vec<EventType>>,
    /// Only events at or after this instant, if set.
    pub since: Option<DateTime<Utc>>,
    /// Only events at or before this instant, if set.
    pub until: Option<DateTime<Utc>>,
    /// Only events whose `data` satisfies this predicate, if set.
    pub data_predicate: Option<Box<dyn Fn(&Value) -> bool + Send + Sync>>,
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFilter")
            .field("event_types", &self.event_types)
            .field("since", &self.since)
            .field("until", &self.until)
            .field("data_predicate", &self.data_predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl EventFilter {
    fn matches(&self, event: &Event) -> bool {
        if let Some(types) = &self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        if let Some(predicate) = &self.data_predicate {
            if !predicate(&event.data) {
                return false;
            }
        }
        true
    }
}

/// A fixed-capacity FIFO ring of events. Pushing past capacity evicts the
/// oldest entry first.
#[derive(Debug, Default)]
pub struct EventRing {
    capacity: usize,
    events: VecDeque<Event>,
}

impl EventRing {
    /// Create a ring bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(256)),
        }
    }

    /// Push an event, evicting the oldest if at capacity.
    pub fn push(&mut self, event: Event) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Events with `seq` strictly greater than `after`, in order — the
    /// standard SSE "replay everything since Last-Event-ID" query.
    pub fn since(&self, after: u64) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.seq > after)
            .cloned()
            .collect()
    }

    /// Events recorded at or after `after`, in order — `GetEventsSince` for
    /// callers (the streamable driver's reconnect replay) that only have a
    /// timestamp, not a prior `seq`.
    pub fn since_timestamp(&self, after: DateTime<Utc>) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.timestamp >= after)
            .cloned()
            .collect()
    }

    /// The `n` most recent events, oldest first — `GetLatestEvents(n)`.
    pub fn latest(&self, n: usize) -> Vec<Event> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Events matching an arbitrary [`EventFilter`], in order.
    pub fn matching(&self, filter: &EventFilter) -> Vec<Event> {
        self.events.iter().filter(|e| filter.matches(e)).cloned().collect()
    }

    /// All events currently held, oldest first.
    pub fn all(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    /// Number of events currently held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the ring holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SessionId {
        SessionId::from_str("mcp-test").unwrap()
    }

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let mut ring = EventRing::new(2);
        ring.push(Event::new(sid(), EventType::Message, Value::Null));
        ring.push(Event::new(sid(), EventType::Message, Value::Null));
        ring.push(Event::new(sid(), EventType::Message, Value::Null));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn since_returns_only_newer_events() {
        let mut ring = EventRing::new(10);
        let e1 = Event::new(sid(), EventType::Message, Value::Null);
        let first_seq = e1.seq;
        ring.push(e1);
        ring.push(Event::new(sid(), EventType::Message, Value::Null));
        let replay = ring.since(first_seq);
        assert_eq!(replay.len(), 1);
    }

    #[test]
    fn latest_returns_at_most_n_most_recent() {
        let mut ring = EventRing::new(10);
        for _ in 0..5 {
            ring.push(Event::new(sid(), EventType::Message, Value::Null));
        }
        assert_eq!(ring.latest(2).len(), 2);
        assert_eq!(ring.latest(100).len(), 5);
    }

    #[test]
    fn matching_filters_by_event_type() {
        let mut ring = EventRing::new(10);
        ring.push(Event::new(sid(), EventType::Connect, Value::Null));
        ring.push(Event::new(sid(), EventType::Message, Value::Null));
        ring.push(Event::new(sid(), EventType::Disconnect, Value::Null));
        let filter = EventFilter { event_types: Some(vec![EventType::Connect, EventType::Disconnect]), ..EventFilter::default() };
        assert_eq!(ring.matching(&filter).len(), 2);
    }

    #[test]
    fn since_timestamp_excludes_earlier_events() {
        let mut ring = EventRing::new(10);
        ring.push(Event::new(sid(), EventType::Message, Value::Null));
        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        ring.push(Event::new(sid(), EventType::Message, Value::Null));
        assert!(ring.since_timestamp(cutoff).is_empty());
    }
}
