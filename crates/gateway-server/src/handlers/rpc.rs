//! The stateless JSON-RPC/HTTP dialect (§6: `/rpc`, `/rpc/batch`,
//! `/rpc/introspection`, `/rpc/health`).
//!
//! This dialect never touches [`gateway_transport::TransportManager`]'s
//! connection table — each request builds a throwaway [`HttpTransport`]
//! against the resolved upstream and throws it away again, matching the
//! driver's own "no persistent connection to hold open" design.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_protocol::jsonrpc::{JsonRpcRequest, JsonRpcResponse, message_to_wire_response, request_from_wire};
use gateway_protocol::validation::SUPPORTED_VERSIONS;
use gateway_protocol::{McpMessage, McpMethod};
use gateway_transport::{HttpTransport, HttpTransportConfig};
use serde_json::json;

use crate::collaborators::UpstreamEndpoint;
use crate::error::{ServerError, ServerResult};
use crate::handlers::{DEFAULT_UPSTREAM_KEY, negotiate_version, resolve_upstream};
use crate::state::AppState;

use super::guard;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rpc", post(rpc_single))
        .route("/rpc/batch", post(rpc_batch))
        .route("/rpc/introspection", get(rpc_introspection))
        .route("/rpc/health", get(rpc_health))
}

async fn rpc_single(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<JsonRpcRequest>) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    match handle_one(&state, &headers, DEFAULT_UPSTREAM_KEY, req).await {
        Ok(resp) => Json(resp).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn rpc_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(reqs): Json<Vec<JsonRpcRequest>>,
) -> Response {
    if let Err(resp) = guard(&state, &headers).await {
        return resp;
    }
    match handle_batch(&state, &headers, DEFAULT_UPSTREAM_KEY, reqs).await {
        Ok(resps) => Json(resps).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn rpc_introspection() -> Response {
    Json(json!({
        "methods": [
            "ping", "initialize", "tools/list", "tools/call",
            "resources/list", "resources/read", "prompts/list", "prompts/get",
            "completion/complete",
        ],
        "protocol_versions": SUPPORTED_VERSIONS,
    }))
    .into_response()
}

async fn rpc_health(State(state): State<AppState>) -> Response {
    let results = state.transports.health_check().await;
    let body: serde_json::Map<String, serde_json::Value> = results
        .into_iter()
        .map(|(transport_type, result)| {
            (
                transport_type.to_string(),
                json!({"healthy": result.healthy, "error": result.error}),
            )
        })
        .collect();
    Json(serde_json::Value::Object(body)).into_response()
}

/// Shared by the bare `/rpc` route and `/servers/{id}/rpc`.
pub(crate) async fn handle_one(
    state: &AppState,
    headers: &HeaderMap,
    server_id: &str,
    req: JsonRpcRequest,
) -> ServerResult<JsonRpcResponse> {
    let version = negotiate_version(headers);
    let msg = request_from_wire(req, version.clone())?;

    if let Some(reply) = answer_ping(&msg, &version) {
        return message_to_wire_response(&reply).ok_or_else(|| ServerError::internal("failed to encode ping reply"));
    }

    let descriptor = resolve_upstream(state, server_id).await?;
    let driver = http_driver_for(&descriptor)?;
    let response = driver.post_one(&msg).await?;
    message_to_wire_response(&response).ok_or_else(|| ServerError::internal("upstream returned a non-response message"))
}

/// Shared by the bare `/rpc/batch` route and `/servers/{id}/rpc` batches.
pub(crate) async fn handle_batch(
    state: &AppState,
    headers: &HeaderMap,
    server_id: &str,
    reqs: Vec<JsonRpcRequest>,
) -> ServerResult<Vec<JsonRpcResponse>> {
    let version = negotiate_version(headers);

    let mut messages = Vec::with_capacity(reqs.len());
    let mut ping_replies = Vec::new();
    for req in reqs {
        let msg = request_from_wire(req, version.clone())?;
        match answer_ping(&msg, &version) {
            Some(reply) => ping_replies.push(reply),
            None => messages.push(msg),
        }
    }

    let mut responses = ping_replies;
    if !messages.is_empty() {
        let descriptor = resolve_upstream(state, server_id).await?;
        let driver = http_driver_for(&descriptor)?;
        responses.extend(driver.send_batch(&messages).await?);
    }

    responses
        .iter()
        .map(|msg| message_to_wire_response(msg).ok_or_else(|| ServerError::internal("upstream returned a non-response message")))
        .collect()
}

/// `ping` never leaves the gateway — answered locally, same as every
/// driver's own internal dialect.
fn answer_ping(msg: &McpMessage, version: &str) -> Option<McpMessage> {
    match msg {
        McpMessage::Request(r) if McpMethod::parse(&r.method) == McpMethod::Ping => {
            Some(McpMessage::response(r.id.clone(), version.to_string(), Default::default()))
        }
        _ => None,
    }
}

fn http_driver_for(descriptor: &crate::collaborators::UpstreamDescriptor) -> ServerResult<HttpTransport> {
    match &descriptor.endpoint {
        UpstreamEndpoint::Url { url, .. } => Ok(HttpTransport::new(HttpTransportConfig {
            endpoint: url.clone(),
            timeout: descriptor.timeout,
            ..HttpTransportConfig::default()
        })),
        UpstreamEndpoint::Command { .. } => {
            Err(ServerError::internal("the rpc/http dialect cannot target a command-launched upstream"))
        }
    }
}
