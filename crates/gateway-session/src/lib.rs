//! Session tracking and the bounded event log backing SSE replay.
//!
//! A [`Session`] is opened per client connection (regardless of wire
//! dialect) and outlives any single transport-driver instance — a streamable
//! HTTP client that reconnects after a network blip resumes the same
//! session rather than getting a new one. [`SessionManager`] owns the
//! session table, a per-session capped event ring (for that session's own
//! `Last-Event-ID` replay), and a second process-wide ring so an SSE client
//! can still be served a replay even after its originating session record
//! itself has been evicted.

pub mod error;
pub mod event;
pub mod manager;
pub mod session;

pub use error::{SessionError, SessionResult};
pub use event::{Event, EventFilter, EventRing, EventType, REPLAY_RING_CAP, SESSION_EVENT_CAP};
pub use manager::{DEFAULT_SWEEP_INTERVAL, SessionManager, SessionMetrics};
pub use session::{DEFAULT_SESSION_TIMEOUT, MAX_SESSION_ID_LEN, Session, SessionId};
