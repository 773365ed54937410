//! Per-dialect HTTP handlers (§6): one module per wire dialect, sharing the
//! guard/negotiation/upstream-resolution helpers below.
//!
//! Two wire shapes cross this boundary. `/rpc*` speaks strict JSON-RPC 2.0
//! (`gateway_protocol::jsonrpc`), matching what [`gateway_transport::HttpTransport`]
//! sends upstream. Every other dialect speaks the flatter, explicitly-tagged
//! [`gateway_transport::wire::WireMessage`] form, matching what its driver
//! natively encodes.

pub mod mcp;
pub mod rpc;
pub mod servers;
pub mod sse;
pub mod stdio;
pub mod ws;

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, http::StatusCode};
use gateway_protocol::validation::SUPPORTED_VERSIONS;
use serde_json::json;

use crate::collaborators::{Principal, RateLimitDecision, UpstreamDescriptor};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Reserved `{server_id}` key the bare (non-`/servers/{id}/...`) routes
/// resolve against, since those routes carry no path segment to name one.
pub const DEFAULT_UPSTREAM_KEY: &str = "default";

/// Negotiate the protocol version for a request: the caller's
/// `MCP-Protocol-Version` header if it names a supported version, else the
/// gateway's preferred (first-listed) version.
pub(crate) fn negotiate_version(headers: &HeaderMap) -> String {
    headers
        .get("MCP-Protocol-Version")
        .and_then(|v| v.to_str().ok())
        .filter(|v| SUPPORTED_VERSIONS.contains(v))
        .unwrap_or(SUPPORTED_VERSIONS[0])
        .to_string()
}

/// Authenticate then rate-limit a request — the two collaborator checks
/// every route runs before touching the core. Either failure answers
/// directly: neither is a [`ServerError`], since both are collaborator
/// decisions rather than gateway-core failures (see `collaborators.rs`).
pub(crate) async fn guard(state: &AppState, headers: &HeaderMap) -> Result<Principal, Response> {
    let auth_header = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());

    let Some(principal) = state.auth.authenticate(auth_header).await else {
        return Err(unauthorized());
    };

    match state.rate_limiter.check(&principal.user_id).await {
        RateLimitDecision::Allow => Ok(principal),
        RateLimitDecision::Reject { retry_after } => Err(too_many_requests(retry_after)),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": -32000, "message": "unauthorized", "kind": "auth"}})),
    )
        .into_response()
}

fn too_many_requests(retry_after: std::time::Duration) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({"error": {"code": -32000, "message": "rate limit exceeded", "kind": "rate_limit"}})),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}

/// Resolve `server_id` to an [`UpstreamDescriptor`], or a 4xx-bearing
/// [`ServerError::internal`] if nothing is registered under that key.
pub(crate) async fn resolve_upstream(state: &AppState, server_id: &str) -> ServerResult<UpstreamDescriptor> {
    state
        .upstreams
        .resolve(server_id)
        .await
        .ok_or_else(|| ServerError::internal(format!("no upstream registered for '{server_id}'")))
}
