//! The transport manager (§4.9): session/driver lifecycle, routing, and the
//! metrics rollup every driver feeds into.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gateway_protocol::McpMessage;
use gateway_session::{EventType, SessionId, SessionManager};
use gateway_transport_traits::{
    Transport, TransportConfig, TransportError, TransportFactory, TransportMessage, TransportResult,
    TransportType,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, warn};

use crate::metrics::{ManagerMetrics, TransportTypeMetrics};
use crate::wire;

/// Wire dialects that bind a driver to a session for their whole lifetime.
/// HTTP is the one stateless exception — every request is independent.
const STATEFUL_TYPES: [TransportType; 4] = [
    TransportType::Sse,
    TransportType::WebSocket,
    TransportType::Streamable,
    TransportType::Stdio,
];

fn is_stateful(transport_type: TransportType) -> bool {
    STATEFUL_TYPES.contains(&transport_type)
}

/// Budget given to a single driver's `Disconnect` during `CloseConnection`
/// and `Shutdown`.
const DISCONNECT_DEADLINE: Duration = Duration::from_secs(5);

/// Caller-supplied identity attached to a new connection.
#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    /// Which wire dialect to open.
    pub transport_type: TransportType,
    /// The authenticated user, if any.
    pub user_id: Option<String>,
    /// The organization/tenant, if any.
    pub org_id: Option<String>,
    /// The upstream MCP server this connection targets, if any.
    pub server_id: Option<String>,
    /// Per-connection overrides layered over the global driver configuration.
    pub config_override: HashMap<String, Value>,
}

impl Default for ConnectionRequest {
    fn default() -> Self {
        Self {
            transport_type: TransportType::Http,
            user_id: None,
            org_id: None,
            server_id: None,
            config_override: HashMap::new(),
        }
    }
}

/// Outcome of a single driver's health probe.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    /// Whether Connect and Disconnect both succeeded.
    pub healthy: bool,
    /// The failure, if any.
    pub error: Option<String>,
}

struct Connection {
    driver: Arc<dyn Transport>,
    transport_type: TransportType,
}

/// Holds the session manager, the driver factory registry, and a map from
/// session id to bound driver.
pub struct TransportManager {
    session_manager: Arc<SessionManager>,
    factories: HashMap<TransportType, Arc<dyn TransportFactory>>,
    enabled: HashSet<TransportType>,
    connections: RwLock<HashMap<SessionId, Connection>>,
    metrics: ManagerMetrics,
}

impl std::fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportManager").finish_non_exhaustive()
    }
}

impl TransportManager {
    /// Construct a manager bound to `session_manager`, with `factories`
    /// registered for every enabled transport type.
    pub fn new(session_manager: Arc<SessionManager>, factories: HashMap<TransportType, Arc<dyn TransportFactory>>) -> Self {
        let enabled = factories.keys().copied().collect();
        Self {
            session_manager,
            factories,
            enabled,
            connections: RwLock::new(HashMap::new()),
            metrics: ManagerMetrics::new(),
        }
    }

    /// Open a new connection of `request.transport_type`, creating a session
    /// first for stateful dialects.
    pub async fn create_connection(&self, request: ConnectionRequest) -> TransportResult<SessionId> {
        let transport_type = request.transport_type;
        if !self.enabled.contains(&transport_type) {
            return Err(TransportError::ConfigurationError(format!(
                "transport type {transport_type} is not enabled"
            )));
        }
        let factory = self.factories.get(&transport_type).ok_or_else(|| {
            TransportError::ConfigurationError(format!("no factory registered for {transport_type}"))
        })?;

        let session = if is_stateful(transport_type) {
            let session = self.session_manager.create_session(transport_type).await;
            self.session_manager
                .update_session(&session.id, |s| {
                    s.user_id = request.user_id.clone();
                    if let Some(org) = &request.org_id {
                        s.metadata.insert("org_id".to_string(), Value::String(org.clone()));
                    }
                    if let Some(server) = &request.server_id {
                        s.metadata.insert("server_id".to_string(), Value::String(server.clone()));
                    }
                })
                .await
                .map_err(|e| TransportError::Internal(e.to_string()))?;
            session
        } else {
            self.session_manager.create_session(transport_type).await
        };

        let mut config = TransportConfig {
            transport_type,
            ..TransportConfig::default()
        };
        config.custom.extend(request.config_override);
        if is_stateful(transport_type) {
            // Some drivers (SSE) need the session id at construction time and
            // fix it for their whole lifetime, so it travels in through the
            // factory's config rather than a post-construction call.
            config.custom.insert("session_id".to_string(), Value::String(session.id.to_string()));
        }

        let driver: Arc<dyn Transport> = Arc::from(factory.create(config)?);
        if is_stateful(transport_type) && driver.session_id().await.is_none() {
            driver.set_session_id(session.id.to_string()).await?;
        }

        self.connections.write().insert(
            session.id.clone(),
            Connection { driver, transport_type },
        );
        self.metrics.record_connection_opened(transport_type);
        info!(session_id = %session.id, transport = %transport_type, "connection created");
        Ok(session.id)
    }

    /// Fetch the driver bound to `session_id`.
    pub fn get_connection(&self, session_id: &SessionId) -> TransportResult<Arc<dyn Transport>> {
        self.connections
            .read()
            .get(session_id)
            .map(|c| Arc::clone(&c.driver))
            .ok_or_else(|| TransportError::NotAvailable(format!("no connection bound to session {session_id}")))
    }

    /// Disconnect and forget the driver bound to `session_id`, then close the
    /// session. Errors from `Disconnect` are logged, not propagated — the
    /// connection is removed from the map regardless.
    pub async fn close_connection(&self, session_id: &SessionId) -> TransportResult<()> {
        let connection = self.connections.write().remove(session_id);
        let Some(connection) = connection else {
            return Err(TransportError::NotAvailable(format!("no connection bound to session {session_id}")));
        };

        if tokio::time::timeout(DISCONNECT_DEADLINE, connection.driver.disconnect())
            .await
            .is_err()
        {
            warn!(session_id = %session_id, "disconnect exceeded its deadline");
        }

        self.metrics.record_connection_closed(connection.transport_type);
        self.session_manager
            .close_session(session_id)
            .await
            .map_err(|e| TransportError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Send `msg` over the driver bound to `session_id`, recording duration,
    /// message/error counters, and a session event.
    pub async fn send_message(&self, session_id: &SessionId, msg: &McpMessage) -> TransportResult<()> {
        let driver = self.get_connection(session_id)?;
        let transport_type = driver.transport_type();
        let started = Instant::now();

        let bytes = wire::encode(msg).map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
        let transport_message = TransportMessage::new(msg.id().to_string(), bytes.into());
        let result = driver.send(transport_message).await;

        let elapsed = started.elapsed();
        self.metrics.record_message(transport_type, elapsed, result.is_err());
        let _ = self.session_manager.touch_session(session_id).await;

        let event = serde_json::json!({
            "direction": "outbound",
            "type": msg.type_name(),
            "duration_ms": elapsed.as_millis() as u64,
            "error": result.as_ref().err().map(|e| e.to_string()),
        });
        let _ = self.session_manager.add_event(session_id, EventType::Message, event).await;

        result
    }

    /// Send `msg` to every live driver of `transport_type`. Every driver is
    /// attempted even if some fail; failures are returned keyed by session.
    pub async fn broadcast_message(
        &self,
        transport_type: TransportType,
        msg: &McpMessage,
    ) -> HashMap<SessionId, TransportResult<()>> {
        let targets: Vec<SessionId> = self
            .connections
            .read()
            .iter()
            .filter(|(_, c)| c.transport_type == transport_type)
            .map(|(id, _)| id.clone())
            .collect();

        let mut results = HashMap::new();
        for session_id in targets {
            let result = self.send_message(&session_id, msg).await;
            results.insert(session_id, result);
        }
        results
    }

    /// Construct a throwaway driver for every enabled transport type, attempt
    /// Connect then Disconnect, and report per-type results.
    pub async fn health_check(&self) -> HashMap<TransportType, HealthCheckResult> {
        let mut results = HashMap::new();
        for (transport_type, factory) in &self.factories {
            let outcome = async {
                let config = TransportConfig {
                    transport_type: *transport_type,
                    ..TransportConfig::default()
                };
                let driver = factory.create(config)?;
                driver.connect().await?;
                driver.disconnect().await?;
                Ok::<(), TransportError>(())
            }
            .await;

            results.insert(
                *transport_type,
                match outcome {
                    Ok(()) => HealthCheckResult { healthy: true, error: None },
                    Err(e) => HealthCheckResult { healthy: false, error: Some(e.to_string()) },
                },
            );
        }
        results
    }

    /// Disconnect every bound driver, drop the connection map, then delegate
    /// to the session manager's own shutdown.
    pub async fn shutdown(&self) {
        let connections: Vec<Connection> = self.connections.write().drain().map(|(_, c)| c).collect();
        for connection in connections {
            if tokio::time::timeout(DISCONNECT_DEADLINE, connection.driver.disconnect())
                .await
                .is_err()
            {
                warn!(transport = %connection.transport_type, "shutdown disconnect exceeded its deadline");
            }
        }
        self.session_manager.shutdown().await;
        info!("transport manager shut down");
    }

    /// A snapshot of every transport type's counters, for `GetMetrics`.
    pub fn metrics(&self) -> HashMap<TransportType, TransportTypeMetrics> {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use gateway_transport_traits::{TransportCapabilities, TransportMetrics, TransportState};

    #[derive(Debug)]
    struct StubTransport {
        transport_type: TransportType,
        state: Mutex<TransportState>,
        capabilities: TransportCapabilities,
    }

    impl Transport for StubTransport {
        fn transport_type(&self) -> TransportType {
            self.transport_type
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
        fn send(&self, _message: TransportMessage) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
            Box::pin(async move { Ok(()) })
        }
        fn receive(&self) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
            Box::pin(async move { Ok(None) })
        }
        fn metrics(&self) -> Pin<Box<dyn Future<Output = TransportMetrics> + Send + '_>> {
            Box::pin(async move { TransportMetrics::default() })
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[derive(Debug)]
    struct StubFactory {
        transport_type: TransportType,
    }

    impl TransportFactory for StubFactory {
        fn transport_type(&self) -> TransportType {
            self.transport_type
        }
        fn create(&self, _config: TransportConfig) -> TransportResult<Box<dyn Transport>> {
            Ok(Box::new(StubTransport {
                transport_type: self.transport_type,
                state: Mutex::new(TransportState::Disconnected),
                capabilities: TransportCapabilities::default(),
            }))
        }
    }

    fn test_manager() -> TransportManager {
        let mut factories: HashMap<TransportType, Arc<dyn TransportFactory>> = HashMap::new();
        factories.insert(TransportType::Http, Arc::new(StubFactory { transport_type: TransportType::Http }));
        factories.insert(TransportType::Sse, Arc::new(StubFactory { transport_type: TransportType::Sse }));
        TransportManager::new(Arc::new(SessionManager::default()), factories)
    }

    #[tokio::test]
    async fn create_then_get_connection_round_trips() {
        let manager = test_manager();
        let session_id = manager
            .create_connection(ConnectionRequest { transport_type: TransportType::Sse, ..Default::default() })
            .await
            .unwrap();
        assert!(manager.get_connection(&session_id).is_ok());
    }

    #[tokio::test]
    async fn disabled_transport_type_is_rejected() {
        let manager = test_manager();
        let err = manager
            .create_connection(ConnectionRequest { transport_type: TransportType::WebSocket, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConfigurationError(_)));
    }

    #[tokio::test]
    async fn close_connection_removes_the_binding() {
        let manager = test_manager();
        let session_id = manager
            .create_connection(ConnectionRequest { transport_type: TransportType::Sse, ..Default::default() })
            .await
            .unwrap();
        manager.close_connection(&session_id).await.unwrap();
        assert!(manager.get_connection(&session_id).is_err());
    }

    #[tokio::test]
    async fn health_check_reports_every_enabled_type() {
        let manager = test_manager();
        let results = manager.health_check().await;
        assert_eq!(results.len(), 2);
        assert!(results.values().all(|r| r.healthy));
    }

    #[tokio::test]
    async fn send_message_updates_metrics() {
        let manager = test_manager();
        let session_id = manager
            .create_connection(ConnectionRequest { transport_type: TransportType::Sse, ..Default::default() })
            .await
            .unwrap();
        let msg = McpMessage::notification("n1", "notifications/progress", "2025-06-18", HashMap::new());
        manager.send_message(&session_id, &msg).await.unwrap();
        let snapshot = manager.metrics();
        assert_eq!(snapshot[&TransportType::Sse].messages_total, 1);
    }
}
