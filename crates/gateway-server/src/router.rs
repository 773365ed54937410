//! Assembles the full §6 HTTP surface from the per-dialect handler modules.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers::{mcp, rpc, servers, sse, stdio, ws};
use crate::state::AppState;

/// Build the gateway's router over `state`. The `gateway` binary crate owns
/// the listener and graceful shutdown; this just wires routes to handlers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(rpc::router())
        .merge(sse::router())
        .merge(ws::router())
        .merge(mcp::router())
        .merge(stdio::router())
        .merge(servers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
