//! The streamable-HTTP driver (§4.7): the MCP "streamable" dialect, in
//! either JSON or SSE response mode, with a bounded retry-and-backoff
//! reconnect helper.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use gateway_protocol::{McpMessage, ProtocolVersion};
use gateway_session::{EventType, SessionId, SessionManager};
use gateway_transport_traits::{
    Transport, TransportCapabilities, TransportConfig, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::retry::{RetryPolicy, is_retryable};
use crate::wire;

/// Which wire shape the upstream answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Each request gets one JSON body back.
    Json,
    /// Each request gets back an SSE-framed body; frames are appended to the
    /// session's event store as they arrive.
    Sse,
}

/// Configuration for the streamable-HTTP driver.
#[derive(Debug, Clone)]
pub struct StreamableConfig {
    /// The MCP streamable endpoint.
    pub endpoint: String,
    /// Whether a session id is created and honored for this connection.
    pub stateful: bool,
    /// JSON or SSE response mode.
    pub mode: StreamMode,
    /// Protocol version stamped on outgoing envelopes.
    pub version: ProtocolVersion,
    /// Backoff policy for reconnects.
    pub retry: RetryPolicy,
}

impl Default for StreamableConfig {
    fn default() -> Self {
        Self {
            endpoint: "/mcp".to_string(),
            stateful: true,
            mode: StreamMode::Json,
            version: "2025-06-18".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Methods the driver can answer without a network round trip. Each such
/// reply is journaled with `processed_internally=true` so observability is
/// not silently lost, per the spec's explicit-synthetic-response rule.
fn answer_internally(msg: &McpMessage) -> Option<McpMessage> {
    match msg {
        McpMessage::Request(r) if r.method == "ping" => {
            let mut result = HashMap::new();
            result.insert("message".to_string(), Value::String("pong".to_string()));
            Some(McpMessage::response(r.id.clone(), r.version.clone(), result))
        }
        _ => None,
    }
}

/// The streamable-HTTP driver.
#[derive(Debug)]
pub struct StreamableTransport {
    config: StreamableConfig,
    client: reqwest::Client,
    session_manager: Arc<SessionManager>,
    session_id: Mutex<Option<SessionId>>,
    state: Mutex<TransportState>,
    capabilities: TransportCapabilities,
}

impl StreamableTransport {
    /// Construct a driver bound to `config`.
    pub fn new(config: StreamableConfig, session_manager: Arc<SessionManager>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            session_manager,
            session_id: Mutex::new(None),
            state: Mutex::new(TransportState::Disconnected),
            capabilities: TransportCapabilities {
                supports_streaming: true,
                supports_bidirectional: true,
                ..TransportCapabilities::default()
            },
        }
    }

    async fn journal(&self, direction: &str, msg: &McpMessage, processed_internally: bool) {
        let Some(session_id) = self.session_id.lock().unwrap().clone() else { return };
        let data = serde_json::json!({
            "direction": direction,
            "type": msg.type_name(),
            "method": msg.method(),
            "processed_internally": processed_internally,
        });
        let _ = self.session_manager.add_event(&session_id, EventType::Message, data).await;
    }

    async fn post_json(&self, msg: &McpMessage) -> TransportResult<McpMessage> {
        let body = wire::WireMessage::from(msg);
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if response.status().is_server_error() {
            return Err(TransportError::NotAvailable(format!("upstream HTTP {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(TransportError::ProtocolError(format!("upstream HTTP {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
        wire::decode(&bytes).map_err(|e| TransportError::SerializationFailed(e.to_string()))
    }

    async fn post_sse(&self, msg: &McpMessage) -> TransportResult<McpMessage> {
        let body = wire::WireMessage::from(msg);
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::NotAvailable(format!("upstream HTTP {}", response.status())));
        }

        let mut stream = response.bytes_stream();
        let mut buf = Vec::new();
        let mut last: Option<McpMessage> = None;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
            buf.extend_from_slice(&chunk);
            while let Some(frame_end) = find_double_newline(&buf) {
                let frame = buf.drain(..frame_end + 2).collect::<Vec<_>>();
                if let Some(decoded) = decode_sse_frame(&frame) {
                    if let Some(session_id) = self.session_id.lock().unwrap().clone() {
                        let _ = self.session_manager.add_event(&session_id, EventType::Message, decoded.clone()).await;
                    }
                    if let Ok(msg) = serde_json::from_value::<wire::WireMessage>(decoded) {
                        last = Some(msg.into());
                    }
                }
            }
        }
        last.ok_or_else(|| TransportError::ProtocolError("upstream SSE body carried no parseable frame".to_string()))
    }

    /// `Disconnect` then `Connect` with a short backoff, per §4.7.
    pub async fn reconnect(&self) -> TransportResult<()> {
        self.disconnect_inner().await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.connect_inner().await
    }

    /// Send with the driver's retry helper, retrying only classified
    /// retryable failures (connection refused, timeout, DNS failure, 5xx).
    pub async fn send_with_retry(&self, msg: &McpMessage) -> TransportResult<McpMessage> {
        let mut attempt = 0;
        loop {
            let result = match self.config.mode {
                StreamMode::Json => self.post_json(msg).await,
                StreamMode::Sse => self.post_sse(msg).await,
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if is_retryable(&e) && self.config.retry.should_retry(attempt) => {
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(attempt, ?delay, error = %e, "retrying streamable request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    if self.reconnect().await.is_err() {
                        // Keep retrying the send even if the reconnect probe
                        // itself failed; the next attempt will surface the
                        // real error if the upstream is still down.
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect_inner(&self) -> TransportResult<()> {
        if self.config.stateful && self.session_id.lock().unwrap().is_none() {
            let session = self.session_manager.create_session(TransportType::Streamable).await;
            *self.session_id.lock().unwrap() = Some(session.id);
        }
        *self.state.lock().unwrap() = TransportState::Connected;
        info!(stateful = self.config.stateful, mode = ?self.config.mode, "streamable driver connected");
        Ok(())
    }

    async fn disconnect_inner(&self) -> TransportResult<()> {
        *self.state.lock().unwrap() = TransportState::Disconnected;
        Ok(())
    }
}

fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/// Parse one SSE frame's `data:` lines back into a JSON value.
fn decode_sse_frame(frame: &[u8]) -> Option<Value> {
    let text = String::from_utf8_lossy(frame);
    let mut data = String::new();
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("data: ") {
            data.push_str(rest);
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push_str(rest);
        }
    }
    if data.is_empty() {
        return None;
    }
    serde_json::from_str(&data).ok().or(Some(Value::String(data)))
}

impl Transport for StreamableTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Streamable
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.lock().unwrap().clone() })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { self.connect_inner().await })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { self.disconnect_inner().await })
    }

    fn send(&self, message: TransportMessage) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let msg = wire::decode(&message.payload).map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
            self.journal("outbound", &msg, false).await;

            if let Some(synthetic) = answer_internally(&msg) {
                debug!(id = msg.id(), "streamable driver answered internally");
                self.journal("inbound", &synthetic, true).await;
                return Ok(());
            }

            let response = self.send_with_retry(&msg).await?;
            self.journal("inbound", &response, false).await;
            if let Some(session_id) = self.session_id.lock().unwrap().clone() {
                let _ = self.session_manager.touch_session(&session_id).await;
            }
            Ok(())
        })
    }

    fn receive(&self) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move {
            Err(TransportError::NotAvailable(
                "the streamable driver journals responses into the session event store; read them from there"
                    .to_string(),
            ))
        })
    }

    fn metrics(&self) -> Pin<Box<dyn Future<Output = TransportMetrics> + Send + '_>> {
        Box::pin(async move { TransportMetrics::default() })
    }

    fn session_id(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.session_id.lock().unwrap().as_ref().map(|s| s.to_string()) })
    }

    fn set_session_id(&self, session_id: String) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let id = SessionId::from_str(&session_id).map_err(|e| TransportError::ConfigurationError(e.to_string()))?;
            *self.session_id.lock().unwrap() = Some(id);
            Ok(())
        })
    }

    fn configure(&self, _config: TransportConfig) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_is_answered_internally() {
        let msg = McpMessage::request("s1", "ping", "2025-06-18", HashMap::new());
        let response = answer_internally(&msg).unwrap();
        assert_eq!(response.type_name(), "response");
    }

    #[test]
    fn non_ping_requests_fall_through_to_the_network() {
        let msg = McpMessage::request("s1", "tools/call", "2025-06-18", HashMap::new());
        assert!(answer_internally(&msg).is_none());
    }

    #[tokio::test]
    async fn connecting_a_stateful_driver_mints_a_session() {
        let manager = Arc::new(SessionManager::default());
        let driver = StreamableTransport::new(StreamableConfig::default(), manager);
        driver.connect().await.unwrap();
        assert!(driver.session_id().await.is_some());
    }

    #[tokio::test]
    async fn stateless_connect_mints_no_session() {
        let manager = Arc::new(SessionManager::default());
        let config = StreamableConfig { stateful: false, ..StreamableConfig::default() };
        let driver = StreamableTransport::new(config, manager);
        driver.connect().await.unwrap();
        assert!(driver.session_id().await.is_none());
    }

    #[test]
    fn sse_frame_decodes_its_data_lines() {
        let frame = b"id: 1\nevent: data\ndata: {\"hello\":\"world\"}\n\n";
        let value = decode_sse_frame(frame).unwrap();
        assert_eq!(value, serde_json::json!({"hello": "world"}));
    }
}
