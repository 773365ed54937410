//! The Streamable HTTP MCP dialect (§6: `/mcp`, `/mcp/capabilities`, `/mcp/status`).
//!
//! Unlike `/rpc`, this dialect's connection is stateful and lives in
//! [`gateway_transport::TransportManager`]'s connection table for the
//! session's lifetime — `send_with_retry` is called directly (not
//! `Transport::send`, which discards the response) so the handler can hand
//! the reply straight back to the caller.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_protocol::validation::SUPPORTED_VERSIONS;
use gateway_transport::StreamableTransport;
use gateway_transport::manager::ConnectionRequest;
use gateway_transport::wire::WireMessage;
use gateway_transport_traits::TransportType;
use serde_json::{Value, json};

use crate::collaborators::UpstreamEndpoint;
use crate::error::{ServerError, ServerResult};
use crate::handlers::{DEFAULT_UPSTREAM_KEY, guard, resolve_upstream};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mcp", post(mcp_handle))
        .route("/mcp/capabilities", get(mcp_capabilities))
        .route("/mcp/status", get(mcp_status))
}

async fn mcp_handle(State(state): State<AppState>, headers: HeaderMap, Json(wire_msg): Json<WireMessage>) -> Response {
    let principal = match guard(&state, &headers).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match handle(&state, DEFAULT_UPSTREAM_KEY, Some(principal.user_id), wire_msg).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Shared by the bare `/mcp` route and `/servers/{id}/mcp`.
pub(crate) async fn handle(
    state: &AppState,
    server_id: &str,
    user_id: Option<String>,
    wire_msg: WireMessage,
) -> ServerResult<WireMessage> {
    let descriptor = resolve_upstream(state, server_id).await?;
    let mut config_override = HashMap::new();
    match &descriptor.endpoint {
        UpstreamEndpoint::Url { url, .. } => {
            config_override.insert("endpoint".to_string(), Value::String(url.clone()));
        }
        UpstreamEndpoint::Command { .. } => {
            return Err(ServerError::internal("the streamable dialect cannot target a command-launched upstream"));
        }
    }

    let session_id = state
        .transports
        .create_connection(ConnectionRequest {
            transport_type: TransportType::Streamable,
            user_id,
            server_id: Some(server_id.to_string()),
            config_override,
            ..ConnectionRequest::default()
        })
        .await?;

    let driver = state.transports.get_connection(&session_id)?;
    let streamable = driver
        .as_any()
        .downcast_ref::<StreamableTransport>()
        .ok_or_else(|| ServerError::internal("mcp connection did not bind a streamable driver"))?;

    let msg = wire_msg.into();
    let response = streamable.send_with_retry(&msg).await?;
    Ok(WireMessage::from(&response))
}

async fn mcp_capabilities() -> Response {
    Json(json!({
        "protocol_versions": SUPPORTED_VERSIONS,
        "modes": ["json", "sse"],
    }))
    .into_response()
}

async fn mcp_status(State(state): State<AppState>) -> Response {
    let sessions = state.sessions.get_sessions_by_transport(TransportType::Streamable).await;
    let metrics = state.transports.metrics();
    Json(json!({
        "active_sessions": sessions.len(),
        "metrics": metrics.get(&TransportType::Streamable),
    }))
    .into_response()
}
