//! The JSON-RPC/HTTP driver (§4.4): stateless request/response, batch form.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use gateway_protocol::jsonrpc::{
    JsonRpcResponse, JsonRpcResponsePayload, message_to_wire_request,
};
use gateway_protocol::{MessageId, ProtocolVersion};
use gateway_transport_traits::{
    Transport, TransportCapabilities, TransportConfig, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::wire;

const DEFAULT_ENDPOINT: &str = "/rpc";

/// Configuration specific to the JSON-RPC/HTTP driver.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// The upstream JSON-RPC POST target.
    pub endpoint: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Protocol version stamped on outgoing requests.
    pub version: ProtocolVersion,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            version: "2025-06-18".to_string(),
        }
    }
}

/// Stateless request/response JSON-RPC over HTTP.
///
/// `Connect`/`Disconnect` are no-ops — there is no persistent connection to
/// hold open — but still flip the reported [`TransportState`] so callers that
/// check `is_connected` behave consistently across drivers.
#[derive(Debug)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: reqwest::Client,
    state: Mutex<TransportState>,
    session_id: Mutex<Option<String>>,
    capabilities: TransportCapabilities,
}

impl HttpTransport {
    /// Construct a driver bound to `config`.
    pub fn new(config: HttpTransportConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            state: Mutex::new(TransportState::Disconnected),
            session_id: Mutex::new(None),
            capabilities: TransportCapabilities {
                supports_bidirectional: false,
                ..TransportCapabilities::default()
            },
        }
    }

    fn response_from_wire(resp: JsonRpcResponse, version: ProtocolVersion) -> gateway_protocol::McpMessage {
        let id: MessageId = match &resp.id {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        };
        match resp.payload {
            JsonRpcResponsePayload::Success { result } => {
                gateway_protocol::McpMessage::response(id, version, value_to_map(result))
            }
            JsonRpcResponsePayload::Error { error } => {
                gateway_protocol::McpMessage::error(id, version, error.into())
            }
        }
    }

    /// Send a single request and return its response, without going through
    /// [`Transport::send`] (which discards the response body).
    pub async fn post_one(&self, msg: &gateway_protocol::McpMessage) -> TransportResult<gateway_protocol::McpMessage> {
        let wire_req = message_to_wire_request(msg)
            .ok_or_else(|| TransportError::ProtocolError("only requests can be sent over the HTTP driver".into()))?;

        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&wire_req);

        if let Some(sid) = self.session_id.lock().unwrap().clone() {
            builder = builder.header("X-Session-ID", sid);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::NotAvailable(format!(
                "upstream returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| TransportError::SerializationFailed(e.to_string()))?;

        Ok(Self::response_from_wire(body, self.config.version.clone()))
    }

    /// Send a batch of requests and return the responses re-sorted into the
    /// same order as the input, matched by id — the wire may answer out of
    /// order.
    pub async fn send_batch(
        &self,
        messages: &[gateway_protocol::McpMessage],
    ) -> TransportResult<Vec<gateway_protocol::McpMessage>> {
        gateway_protocol::validation::validate_batch_nonempty(messages)
            .map_err(|e| TransportError::ProtocolError(e.to_string()))?;

        let wire_reqs: Vec<_> = messages
            .iter()
            .map(|m| {
                message_to_wire_request(m)
                    .ok_or_else(|| TransportError::ProtocolError("batch entries must all be requests".into()))
            })
            .collect::<TransportResult<_>>()?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&wire_reqs)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::NotAvailable(format!(
                "upstream returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let bodies: Vec<JsonRpcResponse> = response
            .json()
            .await
            .map_err(|e| TransportError::SerializationFailed(e.to_string()))?;

        let mut by_id: HashMap<String, JsonRpcResponse> = bodies
            .into_iter()
            .map(|r| {
                let id = match &r.id {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => String::new(),
                };
                (id, r)
            })
            .collect();

        messages
            .iter()
            .map(|req| {
                let resp = by_id
                    .remove(req.id())
                    .ok_or_else(|| TransportError::ProtocolError(format!("missing response for id {}", req.id())))?;
                Ok(Self::response_from_wire(resp, self.config.version.clone()))
            })
            .collect()
    }
}

fn value_to_map(v: Value) -> HashMap<String, Value> {
    match v {
        Value::Object(map) => map.into_iter().collect(),
        other => {
            let mut map = HashMap::new();
            map.insert("_".to_string(), other);
            map
        }
    }
}

impl Transport for HttpTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Http
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.lock().unwrap().clone() })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock().unwrap() = TransportState::Connected;
            Ok(())
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock().unwrap() = TransportState::Disconnected;
            Ok(())
        })
    }

    fn send(&self, message: TransportMessage) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let started = Instant::now();
            let msg = wire::decode(&message.payload).map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
            let result = self.post_one(&msg).await;
            debug!(elapsed_ms = started.elapsed().as_millis(), "http driver round trip");
            result.map(|_| ())
        })
    }

    fn receive(&self) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move {
            warn!("receive() called on the HTTP driver; use request/response instead");
            Err(TransportError::NotAvailable(
                "the HTTP driver is a synchronous request/response dialect; use send() and read its return value"
                    .to_string(),
            ))
        })
    }

    fn metrics(&self) -> Pin<Box<dyn Future<Output = TransportMetrics> + Send + '_>> {
        Box::pin(async move { TransportMetrics::default() })
    }

    fn session_id(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.session_id.lock().unwrap().clone() })
    }

    fn set_session_id(&self, session_id: String) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            *self.session_id.lock().unwrap() = Some(session_id);
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
    fn default_config_targets_the_rpc_endpoint() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.endpoint, "/rpc");
    }

    #[tokio::test]
    async fn fresh_driver_reports_disconnected() {
        let driver = HttpTransport::new(HttpTransportConfig::default());
        assert_eq!(driver.state().await, TransportState::Disconnected);
        driver.connect().await.unwrap();
        assert!(driver.is_connected().await);
    }

    #[tokio::test]
    async fn receive_is_rejected_as_a_synchronous_dialect() {
        let driver = HttpTransport::new(HttpTransportConfig::default());
        let err = driver.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::NotAvailable(_)));
    }
}
