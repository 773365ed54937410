//! The session record and its identifier.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use gateway_transport_traits::TransportType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};

/// Maximum length, in bytes, of a session id. Defends against a client
/// supplying an oversized `Last-Event-ID`/session header instead of the id
/// the gateway minted.
pub const MAX_SESSION_ID_LEN: usize = 256;

/// Default idle timeout before a session is swept.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How long a closed session lingers before the sweep purges it, giving
/// in-flight replay reads a window to observe its final events.
pub const CLOSED_LINGER: Duration = Duration::from_secs(5 * 60);

/// A session's unique identifier, formatted `mcp-{32 hex chars}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new, cryptographically random session id.
    pub fn generate() -> Self {
        Self(format!("mcp-{}", Uuid::new_v4().simple()))
    }

    /// Wrap an externally supplied id (e.g. a reconnecting client's
    /// `Mcp-Session-Id` header), validating its length.
    pub fn from_str(raw: &str) -> SessionResult<Self> {
        if raw.len() > MAX_SESSION_ID_LEN {
            return Err(SessionError::IdTooLong { max: MAX_SESSION_ID_LEN });
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single per-client session.
#[derive(Debug, Clone)]
pub struct Session {
    /// The session's unique id.
    pub id: SessionId,
    /// Which wire dialect this session was opened over.
    pub transport_type: TransportType,
    /// The authenticated user/principal this session belongs to, if any —
    /// opaque to the gateway, supplied by an upstream auth collaborator.
    pub user_id: Option<String>,
    /// Monotonic creation instant, used for age-based eviction.
    pub created_at: Instant,
    /// Monotonic instant of the most recent activity, used for idle eviction.
    pub last_activity: Instant,
    /// Arbitrary caller-supplied metadata (negotiated protocol version,
    /// client name, etc).
    pub metadata: HashMap<String, Value>,
    /// Whether the session has been explicitly closed.
    pub closed: bool,
}

impl Session {
    /// Open a new session bound to a transport dialect.
    pub fn new(transport_type: TransportType) -> Self {
        let now = Instant::now();
        Self {
            id: SessionId::generate(),
            transport_type,
            user_id: None,
            created_at: now,
            last_activity: now,
            metadata: HashMap::new(),
            closed: false,
        }
    }

    /// Whether this session is due for the sweep: idle longer than `timeout`
    /// while open, or closed and past its [`CLOSED_LINGER`] window.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        if self.closed {
            self.last_activity.elapsed() > CLOSED_LINGER
        } else {
            self.last_activity.elapsed() > timeout
        }
    }

    /// Record activity, resetting the idle clock.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_the_mcp_prefix() {
        let id = SessionId::generate();
        assert!(id.as_str().starts_with("mcp-"));
    }

    #[test]
    fn oversized_external_id_is_rejected() {
        let raw = "x".repeat(MAX_SESSION_ID_LEN + 1);
        assert!(SessionId::from_str(&raw).is_err());
    }

    #[test]
    fn fresh_session_is_not_expired() {
        let session = Session::new(TransportType::Http);
        assert!(!session.is_expired(Duration::from_secs(1)));
    }

    #[test]
    fn freshly_closed_session_is_not_yet_expired() {
        let mut session = Session::new(TransportType::Http);
        session.closed = true;
        assert!(!session.is_expired(Duration::from_secs(1)));
    }
}
