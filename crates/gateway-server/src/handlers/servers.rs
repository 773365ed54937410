//! Per-upstream routes (§6: `/servers/{id}/rpc|sse|ws|mcp`) — the same
//! per-dialect logic as the bare routes, resolving `{id}` instead of the
//! reserved default upstream key.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_protocol::jsonrpc::JsonRpcRequest;
use gateway_transport::wire::WireMessage;

use crate::handlers::{guard, mcp, rpc, sse, ws};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/servers/{id}/rpc", post(servers_rpc))
        .route("/servers/{id}/sse", get(servers_sse))
        .route("/servers/{id}/ws", get(servers_ws))
        .route("/servers/{id}/mcp", post(servers_mcp))
}

async fn servers_rpc(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<JsonRpcRequest>,
) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    match rpc::handle_one(&state, &headers, &id, req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn servers_sse(State(state): State<AppState>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let principal = match guard(&state, &headers).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match sse::open_stream(&state, &headers, &id, Some(principal.user_id)).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn servers_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let principal = match guard(&state, &headers).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match ws::upgrade_connection(state, &id, Some(principal.user_id), upgrade).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn servers_mcp(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(wire_msg): Json<WireMessage>,
) -> Response {
    let principal = match guard(&state, &headers).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match mcp::handle(&state, &id, Some(principal.user_id), wire_msg).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => err.into_response(),
    }
}
