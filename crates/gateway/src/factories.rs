//! Concrete [`TransportFactory`] implementations, one per wire dialect,
//! binding each driver to the session manager and the per-dialect timeouts
//! resolved from [`gateway_server::GatewayConfig`].
//!
//! Each factory reads its per-connection overrides out of
//! [`TransportConfig::custom`] — the same map `gateway-server`'s handlers
//! populate through `ConnectionRequest::config_override` — and falls back to
//! the dialect's own defaults otherwise.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gateway_session::{SessionId, SessionManager};
use gateway_transport::{
    HttpTransport, HttpTransportConfig, SseTransport, StdioConfig, StdioTransport, StreamableConfig, StreamableTransport,
    WebSocketTransport,
};
use gateway_transport_traits::{
    Transport, TransportConfig, TransportError, TransportEventEmitter, TransportFactory, TransportResult, TransportType,
};
use serde_json::Value;

fn custom_str(config: &TransportConfig, key: &str) -> Option<String> {
    match config.custom.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Builds the stateless JSON-RPC/HTTP driver.
///
/// `/rpc*` never goes through the transport manager — it builds its own
/// throwaway [`HttpTransport`] straight from the resolved upstream — so in
/// practice this factory only backs
/// [`gateway_transport::manager::TransportManager::health_check`]'s periodic
/// probe, which is why `connect`/`disconnect` being no-ops for this driver
/// is what keeps that probe meaningful at all.
#[derive(Debug, Default)]
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn transport_type(&self) -> TransportType {
        TransportType::Http
    }

    fn create(&self, config: TransportConfig) -> TransportResult<Box<dyn Transport>> {
        let mut http_config = HttpTransportConfig::default();
        if let Some(endpoint) = custom_str(&config, "endpoint") {
            http_config.endpoint = endpoint;
        }
        if let Some(timeout) = config.read_timeout {
            http_config.timeout = timeout;
        }
        Ok(Box::new(HttpTransport::new(http_config)))
    }
}

/// Builds the SSE driver.
///
/// A real connection always carries a `session_id` override — stamped in by
/// `TransportManager::create_connection` before the factory runs, since SSE
/// fixes its session id for the driver's whole lifetime. The health-check
/// probe calls this factory with a bare config and no override; a fresh id
/// is minted for that case since SSE's `connect()` unconditionally fails
/// anyway (it requires `bind(sender)` with a live response writer), so a
/// synthetic id changes nothing about the probe's (unhealthy) outcome.
#[derive(Debug)]
pub struct SseTransportFactory {
    session_manager: Arc<SessionManager>,
    keep_alive: Duration,
}

impl SseTransportFactory {
    pub fn new(session_manager: Arc<SessionManager>, keep_alive: Duration) -> Self {
        Self { session_manager, keep_alive }
    }
}

impl TransportFactory for SseTransportFactory {
    fn transport_type(&self) -> TransportType {
        TransportType::Sse
    }

    fn create(&self, config: TransportConfig) -> TransportResult<Box<dyn Transport>> {
        let session_id = match custom_str(&config, "session_id") {
            Some(raw) => SessionId::from_str(&raw).map_err(|e| TransportError::ConfigurationError(e.to_string()))?,
            None => SessionId::generate(),
        };
        Ok(Box::new(SseTransport::new(self.session_manager.clone(), session_id, self.keep_alive)))
    }
}

/// Builds the WebSocket driver. `bind(socket)` is called separately by the
/// handler once the HTTP upgrade completes, not by this factory.
#[derive(Debug)]
pub struct WebSocketTransportFactory {
    read_timeout: Duration,
    events: Option<TransportEventEmitter>,
}

impl WebSocketTransportFactory {
    pub fn new(read_timeout: Duration, events: Option<TransportEventEmitter>) -> Self {
        Self { read_timeout, events }
    }
}

impl TransportFactory for WebSocketTransportFactory {
    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }

    fn create(&self, config: TransportConfig) -> TransportResult<Box<dyn Transport>> {
        let read_timeout = config.read_timeout.unwrap_or(self.read_timeout);
        Ok(Box::new(WebSocketTransport::new(read_timeout, self.events.clone())))
    }
}

/// Builds the streamable-HTTP driver. `connect()` just marks the driver
/// `Connected` (and mints a session for stateful mode) without making a
/// network call, so this factory's `endpoint` fallback only matters once a
/// message is actually sent.
#[derive(Debug)]
pub struct StreamableTransportFactory {
    session_manager: Arc<SessionManager>,
}

impl StreamableTransportFactory {
    pub fn new(session_manager: Arc<SessionManager>) -> Self {
        Self { session_manager }
    }
}

impl TransportFactory for StreamableTransportFactory {
    fn transport_type(&self) -> TransportType {
        TransportType::Streamable
    }

    fn create(&self, config: TransportConfig) -> TransportResult<Box<dyn Transport>> {
        let mut streamable_config = StreamableConfig::default();
        if let Some(endpoint) = custom_str(&config, "endpoint") {
            streamable_config.endpoint = endpoint;
        }
        Ok(Box::new(StreamableTransport::new(streamable_config, self.session_manager.clone())))
    }
}

/// Builds the STDIO driver. Requires a `command` override — there is no
/// sensible default subprocess to launch, so a connection (or health-check
/// probe) made without one fails here rather than spawning an empty command.
#[derive(Debug)]
pub struct StdioTransportFactory {
    session_manager: Arc<SessionManager>,
    events: Option<TransportEventEmitter>,
}

impl StdioTransportFactory {
    pub fn new(session_manager: Arc<SessionManager>, events: Option<TransportEventEmitter>) -> Self {
        Self { session_manager, events }
    }
}

impl TransportFactory for StdioTransportFactory {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn create(&self, config: TransportConfig) -> TransportResult<Box<dyn Transport>> {
        let command = custom_str(&config, "command")
            .ok_or_else(|| TransportError::ConfigurationError("stdio connection requires a `command` override".to_string()))?;
        let args = match config.custom.get("args") {
            Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        };
        let env: HashMap<String, String> = match config.custom.get("env") {
            Some(Value::Object(map)) => map.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect(),
            _ => HashMap::new(),
        };
        let working_dir = custom_str(&config, "working_dir");
        Ok(Box::new(StdioTransport::new(
            StdioConfig { command, args, env, working_dir },
            self.events.clone(),
            self.session_manager.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_factory_defaults_without_overrides() {
        let factory = HttpTransportFactory;
        let driver = factory.create(TransportConfig::default()).unwrap();
        assert_eq!(driver.transport_type(), TransportType::Http);
    }

    #[test]
    fn stdio_factory_rejects_a_connection_with_no_command() {
        let factory = StdioTransportFactory::new(Arc::new(SessionManager::default()), None);
        let err = factory.create(TransportConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::ConfigurationError(_)));
    }

    #[test]
    fn stdio_factory_reads_command_args_and_env_overrides() {
        let factory = StdioTransportFactory::new(Arc::new(SessionManager::default()), None);
        let mut config = TransportConfig::default();
        config.custom.insert("command".to_string(), Value::String("echo".to_string()));
        config.custom.insert("args".to_string(), Value::Array(vec![Value::String("hi".to_string())]));
        let driver = factory.create(config).unwrap();
        assert_eq!(driver.transport_type(), TransportType::Stdio);
    }

    #[test]
    fn sse_factory_mints_a_session_id_when_none_is_supplied() {
        let factory = SseTransportFactory::new(Arc::new(SessionManager::default()), Duration::from_secs(15));
        let driver = factory.create(TransportConfig::default()).unwrap();
        assert_eq!(driver.transport_type(), TransportType::Sse);
    }
}
