//! Shared application state handed to every axum handler via `State<AppState>`.

use std::sync::Arc;

use gateway_session::SessionManager;
use gateway_transport::TransportManager;

use crate::collaborators::{AuthProvider, LoggingSink, RateLimiter, UpstreamRegistry};
use crate::config::GatewayConfig;

/// Everything a handler needs to answer a request: the two long-lived
/// singletons (session table, transport manager) plus the collaborator
/// handles the composition root wired in.
#[derive(Clone)]
pub struct AppState {
    /// Session table and SSE replay ring.
    pub sessions: Arc<SessionManager>,
    /// Driver factory registry and session-to-driver routing.
    pub transports: Arc<TransportManager>,
    /// Resolves `Authorization` headers to a principal.
    pub auth: Arc<dyn AuthProvider>,
    /// Per-principal request throttling.
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Looks up `{server_id}` route segments.
    pub upstreams: Arc<dyn UpstreamRegistry>,
    /// Out-of-band session-event sink.
    pub logging: Arc<dyn LoggingSink>,
    /// Resolved configuration, kept around for values handlers need directly
    /// (e.g. `max_message_bytes` for size validation).
    pub config: GatewayConfig,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
