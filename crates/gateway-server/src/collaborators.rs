//! Narrow trait contracts for the four collaborators the ingress core
//! consults but never implements itself (§6): auth, rate limiting, upstream
//! server lookup, and the out-of-band logging sink. The gateway binary wires
//! concrete implementations; this crate only defines the seam.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

/// The identity a successful authentication check resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// The authenticated user id.
    pub user_id: String,
    /// The organization the user belongs to, if the deployment is
    /// multi-tenant.
    pub organization_id: Option<String>,
}

/// Resolves the `Authorization` header (or absence of one) to a [`Principal`].
/// The core never inspects the header itself; it calls this trait once per
/// ingress request and proceeds only if it returns `Some`. Absence of a
/// principal is answered with HTTP 401 before the core is consulted at all.
pub trait AuthProvider: Send + Sync {
    /// Resolve the identity behind a raw `Authorization` header value, if any.
    fn authenticate<'a>(
        &'a self,
        authorization_header: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Option<Principal>> + Send + 'a>>;
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request may proceed.
    Allow,
    /// The request must be rejected with HTTP 429; retry after the given
    /// duration.
    Reject {
        /// Suggested `Retry-After` value.
        retry_after: Duration,
    },
}

/// Wraps ingress with a rate-limit check keyed by principal. A `Reject`
/// decision never reaches the core; the collaborator answers 429 directly.
pub trait RateLimiter: Send + Sync {
    /// Decide whether a request from `client_key` may proceed.
    fn check<'a>(
        &'a self,
        client_key: &'a str,
    ) -> Pin<Box<dyn Future<Output = RateLimitDecision> + Send + 'a>>;
}

/// How to reach a specific upstream MCP server, as resolved by
/// [`UpstreamRegistry::resolve`].
#[derive(Debug, Clone)]
pub enum UpstreamEndpoint {
    /// Reach the upstream over a URL-addressed dialect (HTTP/SSE/WebSocket/streamable).
    Url {
        /// The wire dialect the upstream speaks.
        protocol: gateway_transport_traits::TransportType,
        /// The endpoint URL.
        url: String,
    },
    /// Spawn the upstream as a local subprocess speaking STDIO.
    Command {
        /// Executable to run.
        command: String,
        /// Arguments to pass.
        args: Vec<String>,
        /// Environment variables to set, in addition to the inherited
        /// environment.
        env: Vec<(String, String)>,
        /// Working directory for the child process.
        working_dir: Option<String>,
    },
}

/// How an upstream server should be reached and governed.
#[derive(Debug, Clone)]
pub struct UpstreamDescriptor {
    /// Where (or how) to reach it.
    pub endpoint: UpstreamEndpoint,
    /// Per-request timeout for this upstream.
    pub timeout: Duration,
    /// Maximum automatic reconnect attempts before the driver gives up.
    pub max_retries: u32,
}

/// Resolves a `{server_id}` path segment (the `/servers/{id}/...` routes) to
/// an [`UpstreamDescriptor`]. The core forwards traffic to whatever this
/// returns; it never hardcodes a server list.
pub trait UpstreamRegistry: Send + Sync {
    /// Look up the descriptor for `server_id`, if one is registered.
    fn resolve<'a>(
        &'a self,
        server_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<UpstreamDescriptor>> + Send + 'a>>;
}

/// One entry in the out-of-band session-event stream a [`LoggingSink`]
/// receives. Mirrors the shape of [`gateway_session::Event`] plus the
/// session it belongs to, since a sink may aggregate across sessions.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// The session the event occurred on.
    pub session_id: String,
    /// Event payload, as recorded by [`gateway_session::SessionManager::add_event`].
    pub payload: Value,
}

/// Receives the session-event stream for out-of-band logging. The core
/// never blocks on this: calls are fire-and-forget from the core's
/// perspective, typically backed by an unbounded channel on the
/// implementation side.
pub trait LoggingSink: Send + Sync {
    /// Record one session event. Must not block the caller.
    fn record(&self, record: LogRecord);
}

/// A [`LoggingSink`] that discards every record, for deployments that rely
/// solely on `tracing` output rather than a structured session-event feed.
#[derive(Debug, Default)]
pub struct NullLoggingSink;

impl LoggingSink for NullLoggingSink {
    fn record(&self, _record: LogRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_without_panicking() {
        let sink = NullLoggingSink;
        sink.record(LogRecord {
            session_id: "mcp-test".into(),
            payload: serde_json::json!({"direction": "inbound"}),
        });
    }
}
