//! The STDIO driver (§4.8): a subprocess bridge speaking newline-delimited
//! JSON on the child's stdin/stdout.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio as StdStdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gateway_session::{EventType, SessionId, SessionManager};
use gateway_transport_traits::{
    Transport, TransportCapabilities, TransportConfig, TransportError, TransportEventEmitter,
    TransportMessage, TransportMetrics, TransportResult, TransportState, TransportType,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Grace period given to the child after closing stdin before it is killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How to launch the child process.
#[derive(Debug, Clone)]
pub struct StdioConfig {
    /// The executable to run.
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Environment variables layered over the parent process's environment.
    pub env: HashMap<String, String>,
    /// Working directory for the child, if not the parent's.
    pub working_dir: Option<String>,
}

/// Subprocess-backed driver, bidirectional over stdin/stdout.
#[derive(Debug)]
pub struct StdioTransport {
    config: StdioConfig,
    child: Mutex<Option<Child>>,
    stdin_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    state: Arc<Mutex<TransportState>>,
    session_id: Mutex<Option<String>>,
    session_manager: Arc<SessionManager>,
    events: Option<TransportEventEmitter>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
    capabilities: TransportCapabilities,
}

impl StdioTransport {
    /// Construct a driver for `config`. The child is not spawned until
    /// [`Transport::connect`].
    pub fn new(config: StdioConfig, events: Option<TransportEventEmitter>, session_manager: Arc<SessionManager>) -> Self {
        Self {
            config,
            child: Mutex::new(None),
            stdin_tx: Mutex::new(None),
            state: Arc::new(Mutex::new(TransportState::Disconnected)),
            session_id: Mutex::new(None),
            session_manager,
            events,
            tasks: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicBool::new(false)),
            capabilities: TransportCapabilities {
                supports_streaming: false,
                supports_bidirectional: true,
                ..TransportCapabilities::default()
            },
        }
    }

    fn typed_session_id(&self) -> Option<SessionId> {
        self.session_id.lock().unwrap().clone().and_then(|raw| SessionId::from_str(&raw).ok())
    }

    async fn journal(&self, event_type: EventType, data: Value) {
        if let Some(session_id) = self.typed_session_id() {
            let _ = self.session_manager.add_event(&session_id, event_type, data).await;
        }
    }

    async fn spawn_child(&self) -> TransportResult<()> {
        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(StdStdio::piped())
            .stdout(StdStdio::piped())
            .stderr(StdStdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| TransportError::ConnectionFailed(format!("failed to spawn {}: {e}", self.config.command)))?;

        let mut stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(256);
        let writer_closed = Arc::clone(&self.closed);
        let writer = tokio::spawn(async move {
            while let Some(mut line) = rx.recv().await {
                if writer_closed.load(Ordering::Relaxed) {
                    break;
                }
                line.push(b'\n');
                if stdin.write_all(&line).await.is_err() || stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        let events = self.events.clone();
        // This is also the process monitor: stdout EOF is the reliable
        // signal that the child has exited, whether from a clean shutdown or
        // a crash, so it is the one place that flips the reported state back
        // to disconnected outside of an explicit `disconnect()`.
        let monitor_state = Arc::clone(&self.state);
        let monitor_closed = Arc::clone(&self.closed);
        let session_manager = self.session_manager.clone();
        let session_id = self.typed_session_id();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if !line.trim().is_empty() => {
                        if let Some(emitter) = &events {
                            emitter.emit_message_received(String::new(), line.len());
                        }
                        if let Some(session_id) = &session_id {
                            let data = serde_json::from_str::<Value>(&line).unwrap_or_else(|_| Value::String(line.clone()));
                            let _ = session_manager
                                .add_event(session_id, EventType::Message, serde_json::json!({"direction": "inbound", "data": data}))
                                .await;
                        }
                        debug!(bytes = line.len(), "stdio driver read a line from the child");
                    }
                    Ok(Some(_)) => continue,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdio driver stdout read error");
                        break;
                    }
                }
            }
            if !monitor_closed.swap(true, Ordering::SeqCst) {
                *monitor_state.lock().unwrap() = TransportState::Disconnected;
                warn!("stdio child closed stdout; marking transport disconnected");
            }
        });

        let stderr_reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(child_stderr = %line, "stdio child diagnostic output");
            }
        });

        *self.stdin_tx.lock().unwrap() = Some(tx);
        *self.child.lock().unwrap() = Some(child);
        *self.tasks.lock().unwrap() = vec![writer, reader, stderr_reader];

        Ok(())
    }

    async fn disconnect_inner(&self, reason: &str) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            *self.state.lock().unwrap() = TransportState::Disconnected;
            return Ok(());
        }

        self.stdin_tx.lock().unwrap().take();

        let child_slot = self.child.lock().unwrap().take();
        if let Some(mut child) = child_slot {
            let waited = tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await;
            if waited.is_err() {
                let _ = child.kill().await;
            }
        }

        for handle in self.tasks.lock().unwrap().drain(..) {
            handle.abort();
        }

        *self.state.lock().unwrap() = TransportState::Disconnected;
        self.journal(EventType::Disconnect, serde_json::json!({"reason": reason})).await;
        info!(command = %self.config.command, "stdio driver disconnected");
        Ok(())
    }

    /// `Disconnect` then `Connect` with a short backoff, restarting the child
    /// process in place.
    pub async fn restart(&self) -> TransportResult<()> {
        self.disconnect_inner("manual_close").await?;
        self.closed.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.spawn_child().await?;
        *self.state.lock().unwrap() = TransportState::Connected;
        self.journal(EventType::Connect, serde_json::json!({"command": self.config.command})).await;
        Ok(())
    }
}

impl Transport for StdioTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn capabilities(&self) -> &TransportCapabilities {
        &self.capabilities
    }

    fn state(&self) -> Pin<Box<dyn Future<Output = TransportState> + Send + '_>> {
        Box::pin(async move { self.state.lock().unwrap().clone() })
    }

    fn connect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.closed.store(false, Ordering::SeqCst);
            self.spawn_child().await?;
            *self.state.lock().unwrap() = TransportState::Connected;
            self.journal(EventType::Connect, serde_json::json!({"command": self.config.command})).await;
            Ok(())
        })
    }

    fn disconnect(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move { self.disconnect_inner("manual_close").await })
    }

    fn send(&self, message: TransportMessage) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let tx = self
                .stdin_tx
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| TransportError::ConnectionLost("stdio child is not running".to_string()))?;
            tx.send(message.payload.to_vec())
                .await
                .map_err(|_| TransportError::ConnectionLost("stdio writer task exited".to_string()))
        })
    }

    fn receive(&self) -> Pin<Box<dyn Future<Output = TransportResult<Option<TransportMessage>>> + Send + '_>> {
        Box::pin(async move {
            Err(TransportError::NotAvailable(
                "stdio inbound lines are dispatched to the notification emitter, not polled via receive()"
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

    fn echo_config() -> StdioConfig {
        StdioConfig {
            command: "cat".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    fn test_manager() -> Arc<SessionManager> {
        Arc::new(SessionManager::default())
    }

    #[tokio::test]
    async fn fresh_driver_starts_disconnected() {
        let driver = StdioTransport::new(echo_config(), None, test_manager());
        assert_eq!(driver.state().await, TransportState::Disconnected);
    }

    #[tokio::test]
    async fn connect_then_disconnect_round_trips_state() {
        let driver = StdioTransport::new(echo_config(), None, test_manager());
        driver.connect().await.unwrap();
        assert!(driver.is_connected().await);
        driver.disconnect().await.unwrap();
        assert_eq!(driver.state().await, TransportState::Disconnected);
    }

    #[tokio::test]
    async fn send_without_connecting_is_rejected() {
        let driver = StdioTransport::new(echo_config(), None, test_manager());
        let msg = TransportMessage::new("m1".to_string(), bytes::Bytes::from_static(b"{}"));
        let err = driver.send(msg).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionLost(_)));
    }

    #[tokio::test]
    async fn receive_is_rejected_in_favor_of_dispatch() {
        let driver = StdioTransport::new(echo_config(), None, test_manager());
        let err = driver.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn connect_journals_a_connect_event_once_a_session_is_bound() {
        let manager = test_manager();
        let session = manager.create_session(TransportType::Stdio).await;
        let driver = StdioTransport::new(echo_config(), None, manager.clone());
        driver.set_session_id(session.id.to_string()).await.unwrap();
        driver.connect().await.unwrap();
        let events = manager.get_events(&session.id, None).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == gateway_session::EventType::Connect && e.seq > 1));
        driver.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_journals_a_disconnect_event_with_manual_close_reason() {
        let manager = test_manager();
        let session = manager.create_session(TransportType::Stdio).await;
        let driver = StdioTransport::new(echo_config(), None, manager.clone());
        driver.set_session_id(session.id.to_string()).await.unwrap();
        driver.connect().await.unwrap();
        driver.disconnect().await.unwrap();
        let events = manager.get_events(&session.id, None).await.unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.event_type, gateway_session::EventType::Disconnect);
        assert_eq!(last.data["reason"], "manual_close");
    }
}
