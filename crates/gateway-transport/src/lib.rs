//! The five wire-dialect drivers the gateway terminates, the transport
//! manager that routes across them, and the retry/metrics machinery they
//! share.
//!
//! - **Drivers**: [`http::HttpTransport`], [`sse::SseTransport`],
//!   [`websocket::WebSocketTransport`], [`streamable::StreamableTransport`],
//!   [`stdio::StdioTransport`] — each implements
//!   [`gateway_transport_traits::Transport`] (and, where the dialect is
//!   full-duplex, [`gateway_transport_traits::BidirectionalTransport`]).
//! - **Wire form**: [`wire`] — the tagged JSON shape the non-HTTP drivers
//!   speak, distinct from `gateway_protocol::jsonrpc`'s strict JSON-RPC 2.0
//!   envelope used by the HTTP driver.
//! - **Routing**: [`manager::TransportManager`] holds the session manager,
//!   the driver factory registry, and the session-to-driver map.
//! - **Resilience**: [`retry::RetryPolicy`] and [`retry::is_retryable`] back
//!   the streamable driver's reconnect logic.
//! - **Observability**: [`metrics::ManagerMetrics`] tracks per-type counters
//!   and the manager-level response-time moving average.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod http;
pub mod manager;
pub mod metrics;
pub mod retry;
pub mod sse;
pub mod stdio;
pub mod streamable;
pub mod websocket;
pub mod wire;

pub use http::{HttpTransport, HttpTransportConfig};
pub use manager::{ConnectionRequest, HealthCheckResult, TransportManager};
pub use metrics::{ManagerMetrics, TransportTypeMetrics};
pub use retry::{RetryPolicy, is_retryable};
pub use sse::SseTransport;
pub use stdio::{StdioConfig, StdioTransport};
pub use streamable::{StreamMode, StreamableConfig, StreamableTransport};
pub use websocket::WebSocketTransport;
