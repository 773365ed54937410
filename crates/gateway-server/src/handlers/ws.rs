//! The WebSocket dialect (§6: `/ws`, `/ws/send`, `/ws/broadcast`, `/ws/status`).

use std::collections::HashMap;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_session::SessionId;
use gateway_transport::WebSocketTransport;
use gateway_transport::manager::ConnectionRequest;
use gateway_transport::wire::WireMessage;
use gateway_transport_traits::TransportType;
use serde::Deserialize;
use serde_json::json;

use crate::error::ServerResult;
use crate::handlers::{DEFAULT_UPSTREAM_KEY, guard, resolve_upstream};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_connect))
        .route("/ws/send", post(ws_send))
        .route("/ws/broadcast", post(ws_broadcast))
        .route("/ws/status", get(ws_status))
}

async fn ws_connect(State(state): State<AppState>, headers: HeaderMap, upgrade: WebSocketUpgrade) -> Response {
    let principal = match guard(&state, &headers).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match upgrade_connection(state, DEFAULT_UPSTREAM_KEY, Some(principal.user_id), upgrade).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

/// Shared by the bare `/ws` route and `/servers/{id}/ws`.
pub(crate) async fn upgrade_connection(
    state: AppState,
    server_id: &str,
    user_id: Option<String>,
    upgrade: WebSocketUpgrade,
) -> ServerResult<Response> {
    resolve_upstream(&state, server_id).await?;

    let session_id = state
        .transports
        .create_connection(ConnectionRequest {
            transport_type: TransportType::WebSocket,
            user_id,
            server_id: Some(server_id.to_string()),
            ..ConnectionRequest::default()
        })
        .await?;

    Ok(upgrade.on_upgrade(move |socket| async move {
        let Ok(driver) = state.transports.get_connection(&session_id) else {
            return;
        };
        let Some(ws) = driver.as_any().downcast_ref::<WebSocketTransport>() else {
            return;
        };
        ws.bind(socket);
    }))
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: String,
}

async fn ws_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
    Json(wire_msg): Json<WireMessage>,
) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    match send_to(&state, query, wire_msg).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn send_to(state: &AppState, query: SessionQuery, wire_msg: WireMessage) -> ServerResult<()> {
    let session_id = SessionId::from_str(&query.session_id)?;
    let msg = wire_msg.into();
    state.transports.send_message(&session_id, &msg).await?;
    Ok(())
}

async fn ws_broadcast(State(state): State<AppState>, headers: HeaderMap, Json(wire_msg): Json<WireMessage>) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    let msg = wire_msg.into();
    let results = state.transports.broadcast_message(TransportType::WebSocket, &msg).await;
    let body: HashMap<String, bool> = results.into_iter().map(|(id, r)| (id.to_string(), r.is_ok())).collect();
    Json(body).into_response()
}

async fn ws_status(State(state): State<AppState>) -> Response {
    let sessions = state.sessions.get_sessions_by_transport(TransportType::WebSocket).await;
    let metrics = state.transports.metrics();
    Json(json!({
        "active_sessions": sessions.len(),
        "metrics": metrics.get(&TransportType::WebSocket),
    }))
    .into_response()
}
