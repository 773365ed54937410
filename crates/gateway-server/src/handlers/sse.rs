//! The SSE dialect (§6: `/sse`, `/sse/events`, `/sse/broadcast`, `/sse/status`).

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream;
use gateway_session::SessionId;
use gateway_transport::manager::ConnectionRequest;
use gateway_transport::wire::WireMessage;
use gateway_transport::SseTransport;
use gateway_transport_traits::TransportType;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ServerError, ServerResult};
use crate::handlers::{DEFAULT_UPSTREAM_KEY, guard, resolve_upstream};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sse", get(sse_connect))
        .route("/sse/events", get(sse_events))
        .route("/sse/broadcast", post(sse_broadcast))
        .route("/sse/status", get(sse_status))
}

async fn sse_connect(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let principal = match guard(&state, &headers).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match open_stream(&state, &headers, DEFAULT_UPSTREAM_KEY, Some(principal.user_id)).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

/// Shared by the bare `/sse` route and `/servers/{id}/sse`.
pub(crate) async fn open_stream(
    state: &AppState,
    headers: &HeaderMap,
    server_id: &str,
    user_id: Option<String>,
) -> ServerResult<Response> {
    resolve_upstream(state, server_id).await?;

    let session_id = state
        .transports
        .create_connection(ConnectionRequest {
            transport_type: TransportType::Sse,
            user_id,
            server_id: Some(server_id.to_string()),
            ..ConnectionRequest::default()
        })
        .await?;

    let driver = state.transports.get_connection(&session_id)?;
    let sse = driver
        .as_any()
        .downcast_ref::<SseTransport>()
        .ok_or_else(|| ServerError::internal("sse connection did not bind an SSE driver"))?;

    let (tx, rx) = tokio::sync::mpsc::channel(32);
    sse.bind(tx).await?;

    if let Some(last_event_id) = headers
        .get("Last-Event-ID")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        sse.replay(last_event_id).await?;
    }

    let body_stream = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|frame| (Ok::<_, std::io::Error>(frame), rx)) });
    let mut response = Response::new(Body::from_stream(body_stream));
    for (name, value) in SseTransport::response_headers() {
        if let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) {
            response.headers_mut().insert(header_name, value.parse().unwrap());
        }
    }
    response.headers_mut().insert("X-Session-Id", session_id.to_string().parse().unwrap());
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    session_id: String,
    after: Option<u64>,
}

async fn sse_events(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<EventsQuery>) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    match events_since(&state, query).await {
        Ok(events) => Json(events).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn events_since(state: &AppState, query: EventsQuery) -> ServerResult<Vec<gateway_session::Event>> {
    let session_id = SessionId::from_str(&query.session_id)?;
    Ok(state.sessions.get_events(&session_id, query.after).await?)
}

async fn sse_broadcast(State(state): State<AppState>, headers: HeaderMap, Json(wire_msg): Json<WireMessage>) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    let msg = wire_msg.into();
    let results = state.transports.broadcast_message(TransportType::Sse, &msg).await;
    let body: HashMap<String, bool> = results.into_iter().map(|(id, r)| (id.to_string(), r.is_ok())).collect();
    Json(body).into_response()
}

async fn sse_status(State(state): State<AppState>) -> Response {
    let sessions = state.sessions.get_sessions_by_transport(TransportType::Sse).await;
    let metrics = state.transports.metrics();
    Json(json!({
        "active_sessions": sessions.len(),
        "metrics": metrics.get(&TransportType::Sse),
    }))
    .into_response()
}
