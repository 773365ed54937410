//! The STDIO subprocess-bridge dialect (§6: `/stdio/execute`, `/stdio/process`,
//! `/stdio/send`). No `/servers/{id}/stdio` variant exists — the server's
//! launch command comes from the upstream descriptor resolved at `execute`
//! time, not from a path segment.
//!
//! The child's stdout is dispatched to the process-wide event emitter, not
//! journaled per-request (see [`gateway_transport::StdioTransport`]), so
//! there is no synchronous way to hand a subprocess's reply back as this
//! request's response body. `/stdio/execute` is fire-and-acknowledge: it
//! spawns the child and returns its session id for `/stdio/send` and
//! `/stdio/process` to address afterwards.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use gateway_session::SessionId;
use gateway_transport::StdioTransport;
use gateway_transport::manager::ConnectionRequest;
use gateway_transport::wire::WireMessage;
use gateway_transport_traits::TransportType;
use serde::Deserialize;
use serde_json::json;

use crate::collaborators::UpstreamEndpoint;
use crate::error::{ServerError, ServerResult};
use crate::handlers::{DEFAULT_UPSTREAM_KEY, guard, resolve_upstream};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stdio/execute", post(stdio_execute))
        .route("/stdio/process", post(stdio_process))
        .route("/stdio/send", post(stdio_send))
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    #[serde(default = "default_server_id")]
    server_id: String,
}

fn default_server_id() -> String {
    DEFAULT_UPSTREAM_KEY.to_string()
}

async fn stdio_execute(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<ExecuteRequest>) -> Response {
    let principal = match guard(&state, &headers).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match execute(&state, &req.server_id, Some(principal.user_id)).await {
        Ok(session_id) => (StatusCode::ACCEPTED, Json(json!({"session_id": session_id.to_string()}))).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn execute(state: &AppState, server_id: &str, user_id: Option<String>) -> ServerResult<SessionId> {
    let descriptor = resolve_upstream(state, server_id).await?;
    let UpstreamEndpoint::Command { command, args, env, working_dir } = descriptor.endpoint else {
        return Err(ServerError::internal("the stdio dialect requires a command-launched upstream"));
    };

    let mut config_override = std::collections::HashMap::new();
    config_override.insert("command".to_string(), serde_json::Value::String(command));
    config_override.insert(
        "args".to_string(),
        serde_json::Value::Array(args.into_iter().map(serde_json::Value::String).collect()),
    );
    config_override.insert(
        "env".to_string(),
        serde_json::Value::Object(env.into_iter().map(|(k, v)| (k, serde_json::Value::String(v))).collect()),
    );
    if let Some(dir) = working_dir {
        config_override.insert("working_dir".to_string(), serde_json::Value::String(dir));
    }

    let session_id = state
        .transports
        .create_connection(ConnectionRequest {
            transport_type: TransportType::Stdio,
            user_id,
            server_id: Some(server_id.to_string()),
            config_override,
            ..ConnectionRequest::default()
        })
        .await?;

    let driver = state.transports.get_connection(&session_id)?;
    driver.connect().await?;
    Ok(session_id)
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: String,
}

async fn stdio_process(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<SessionQuery>) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    match restart(&state, &query.session_id).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn restart(state: &AppState, session_id: &str) -> ServerResult<()> {
    let session_id = SessionId::from_str(session_id)?;
    let driver = state.transports.get_connection(&session_id)?;
    let stdio = driver
        .as_any()
        .downcast_ref::<StdioTransport>()
        .ok_or_else(|| ServerError::internal("session is not bound to a stdio driver"))?;
    stdio.restart().await?;
    Ok(())
}

async fn stdio_send(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
    Json(wire_msg): Json<WireMessage>,
) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    match send(&state, &query.session_id, wire_msg).await {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn send(state: &AppState, session_id: &str, wire_msg: WireMessage) -> ServerResult<()> {
    let session_id = SessionId::from_str(session_id)?;
    let msg = wire_msg.into();
    state.transports.send_message(&session_id, &msg).await?;
    Ok(())
}
