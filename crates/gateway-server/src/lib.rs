//! HTTP ingress for the MCP gateway: router, per-dialect handlers, and the
//! collaborator contracts (auth, rate limiting, upstream resolution,
//! logging) the handlers are written against.
//!
//! This crate owns no transport state of its own — [`state::AppState`] holds
//! an `Arc<SessionManager>` and `Arc<TransportManager>` from
//! `gateway-session`/`gateway-transport`, plus the collaborator trait objects
//! a deployment supplies. The `gateway` binary crate is the composition root
//! that builds an `AppState` and serves [`router::build_router`].

#![warn(missing_debug_implementations)]
#![warn(clippy::all)]

pub mod collaborators;
pub mod config;
pub mod error;
pub mod error_sanitization;
pub mod handlers;
pub mod router;
pub mod state;

pub use collaborators::{
    AuthProvider, LogRecord, LoggingSink, NullLoggingSink, Principal, RateLimitDecision,
    RateLimiter, UpstreamDescriptor, UpstreamEndpoint, UpstreamRegistry,
};
pub use config::GatewayConfig;
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use state::AppState;
