//! The SSE driver (§4.5): unidirectional server→client event stream with
//! `Last-Event-ID` replay.
//!
//! The driver does not own an HTTP response directly — the HTTP ingress
//! collaborator owns the chunked body writer. What the driver owns is the
//! `Sender` half of the channel that body is read from, so sends from this
//! driver, the keep-alive ticker, and session-replay all funnel through one
//! place, matching the "exactly one unit holds the writer" discipline the
//! spec calls out for SSE.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use gateway_protocol::McpMessage;
use gateway_session::{Event, EventType, SessionId, SessionManager};
use gateway_transport_traits::{
    Transport, TransportCapabilities, TransportConfig, TransportError, TransportMessage,
    TransportMetrics, TransportResult, TransportState, TransportType,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::wire;

/// Default cadence for the `: keep-alive\n\n` comment ping.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

/// One SSE frame, pre-rendered for the chunked body writer.
pub type SseFrame = Bytes;

/// Unidirectional server→client SSE driver.
#[derive(Debug)]
pub struct SseTransport {
    session_manager: Arc<SessionManager>,
    session_id: SessionId,
    writer: Mutex<Option<mpsc::Sender<SseFrame>>>,
    keep_alive: Duration,
    keep_alive_task: Mutex<Option<JoinHandle<()>>>,
    state: Mutex<TransportState>,
    capabilities: TransportCapabilities,
}

impl SseTransport {
    /// Construct a driver bound to `session_id`, journaling replay events
    /// through `session_manager`.
    pub fn new(session_manager: Arc<SessionManager>, session_id: SessionId, keep_alive: Duration) -> Self {
        Self {
            session_manager,
            session_id,
            writer: Mutex::new(None),
            keep_alive,
            keep_alive_task: Mutex::new(None),
            state: Mutex::new(TransportState::Disconnected),
            capabilities: TransportCapabilities {
                supports_streaming: true,
                supports_bidirectional: false,
                ..TransportCapabilities::default()
            },
        }
    }

    /// The response headers the HTTP ingress collaborator must set before
    /// streaming this driver's frames.
    pub fn response_headers() -> &'static [(&'static str, &'static str)] {
        &[
            ("Content-Type", "text/event-stream"),
            ("Cache-Control", "no-cache"),
            ("Connection", "keep-alive"),
            ("Access-Control-Allow-Origin", "*"),
        ]
    }

    /// Bind the chunked body writer and begin streaming. Emits the
    /// `connected` event and starts the keep-alive ticker.
    pub async fn bind(&self, sender: mpsc::Sender<SseFrame>) -> TransportResult<()> {
        *self.writer.lock().unwrap() = Some(sender);
        *self.state.lock().unwrap() = TransportState::Connected;

        self.emit_frame(EventType::Connect, Some("connected"), serde_json::json!({"session_id": self.session_id.as_str()}))
            .await?;

        let writer = self.writer.lock().unwrap().clone();
        let cadence = self.keep_alive;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let Some(sender) = writer.clone() else { break };
                if sender.send(Bytes::from_static(b": keep-alive\n\n")).await.is_err() {
                    break;
                }
            }
        });
        *self.keep_alive_task.lock().unwrap() = Some(handle);

        Ok(())
    }

    /// Replay events after `last_event_id` from the process-wide ring. Errors
    /// (to be surfaced by the caller as HTTP 409 Gone) when the id is unknown
    /// to the ring — the prior session's events are never replayed in that
    /// case.
    pub async fn replay(&self, last_event_id: u64) -> TransportResult<()> {
        let events = self.session_manager.replay_since(last_event_id).await;
        if events.is_empty() && last_event_id != 0 {
            return Err(TransportError::NotAvailable(format!(
                "Last-Event-ID {last_event_id} is not present in the replay ring"
            )));
        }
        for event in events {
            self.write_event(&event).await?;
        }
        Ok(())
    }

    async fn write_event(&self, event: &Event) -> TransportResult<()> {
        let mut frame = format!("id: {}\n", event.seq);
        frame.push_str("event: data\n");
        push_data_lines(&mut frame, &event.data);
        frame.push('\n');
        self.write_raw(Bytes::from(frame)).await
    }

    async fn emit_frame(&self, event_type: EventType, event_name: Option<&str>, data: Value) -> TransportResult<()> {
        let event = self
            .session_manager
            .add_event(&self.session_id, event_type, data.clone())
            .await
            .map_err(|e| TransportError::NotAvailable(e.to_string()))?;

        let mut frame = format!("id: {}\n", event.seq);
        if let Some(name) = event_name {
            frame.push_str(&format!("event: {name}\n"));
        }
        push_data_lines(&mut frame, &data);
        frame.push('\n');
        self.write_raw(Bytes::from(frame)).await
    }

    async fn write_raw(&self, frame: Bytes) -> TransportResult<()> {
        let sender = self
            .writer
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TransportError::ConnectionLost("SSE writer not bound".to_string()))?;
        sender
            .send(frame)
            .await
            .map_err(|_| TransportError::ConnectionLost("SSE body receiver dropped".to_string()))
    }

    async fn disconnect_inner(&self) -> TransportResult<()> {
        let already_disconnected = {
            let mut state = self.state.lock().unwrap();
            if *state == TransportState::Disconnected {
                true
            } else {
                *state = TransportState::Disconnecting;
                false
            }
        };
        if already_disconnected {
            return Ok(());
        }

        let _ = self
            .emit_frame(EventType::Disconnect, Some("disconnected"), serde_json::json!({"session_id": self.session_id.as_str()}))
            .await;

        if let Some(handle) = self.keep_alive_task.lock().unwrap().take() {
            handle.abort();
        }
        // Unbind the writer under the mutex before the channel closes, so no
        // concurrent sender can race into a channel whose receiver is gone.
        *self.writer.lock().unwrap() = None;
        *self.state.lock().unwrap() = TransportState::Disconnected;
        info!(session_id = %self.session_id, "sse driver disconnected");
        Ok(())
    }
}

/// Split a value across one or more `data:` lines per the SSE text grammar.
/// Non-string data is JSON-encoded first; multi-line strings get one
/// `data:` line per source line.
fn push_data_lines(frame: &mut String, data: &Value) {
    let rendered = match data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    for line in rendered.lines() {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    if rendered.is_empty() {
        frame.push_str("data: \n");
    }
}

impl Transport for SseTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Sse
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
                "SSE requires bind(sender) with a live response writer, not connect()".to_string(),
            ))
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { self.disconnect_inner().await })
    }

    fn send(&self, message: TransportMessage) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let msg: McpMessage = wire::decode(&message.payload).map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
            let data = serde_json::to_value(&wire::WireMessage::from(&msg))
                .map_err(|e| TransportError::SerializationFailed(e.to_string()))?;
            debug!(session_id = %self.session_id, "sse driver emitting data event");
            self.emit_frame(EventType::Message, Some("data"), data).await
        })
    }

    fn receive(&self) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move {
            Err(TransportError::NotAvailable(
                "SSE is unidirectional; subscribe to the event stream instead of calling receive()".to_string(),
            ))
        })
    }

    fn metrics(&self) -> Pin<Box<dyn Future<Output = TransportMetrics> + Send + '_>> {
        Box::pin(async move { TransportMetrics::default() })
    }

    fn session_id(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { Some(self.session_id.to_string()) })
    }

    fn set_session_id(&self, _session_id: String) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            Err(TransportError::ConfigurationError(
                "an SSE driver's session id is fixed at construction".to_string(),
            ))
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

    fn test_session_id() -> SessionId {
        SessionId::from_str("mcp-sse-test").unwrap()
    }

    #[tokio::test]
    async fn bind_emits_a_connected_frame() {
        let manager = Arc::new(SessionManager::default());
        manager.create_session(gateway_transport_traits::TransportType::Sse).await;
        let driver = SseTransport::new(manager, test_session_id(), Duration::from_secs(30));
        let (tx, mut rx) = mpsc::channel(8);
        driver.bind(tx).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert!(String::from_utf8_lossy(&first).contains("event: connected"));
    }

    #[tokio::test]
    async fn replay_with_unknown_last_event_id_errors() {
        let manager = Arc::new(SessionManager::default());
        let driver = SseTransport::new(manager, test_session_id(), Duration::from_secs(30));
        let err = driver.replay(999_999).await.unwrap_err();
        assert!(matches!(err, TransportError::NotAvailable(_)));
    }

    #[test]
    fn multiline_strings_split_across_data_lines() {
        let mut frame = String::new();
        push_data_lines(&mut frame, &Value::String("line one\nline two".to_string()));
        assert_eq!(frame, "data: line one\ndata: line two\n");
    }
}
