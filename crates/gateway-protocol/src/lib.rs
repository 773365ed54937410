//! MCP message framing, JSON-RPC 2.0 mapping, and error taxonomy.
//!
//! This crate owns the wire boundary: parsing raw JSON-RPC 2.0 envelopes into
//! the canonical [`McpMessage`] sealed sum type, validating them against the
//! framing contract, and mapping failures onto the gateway's fixed JSON-RPC
//! error codes. It has no opinion about what a `tools/call` does once routed
//! — that is an upstream MCP server's concern, not this crate's.
//!
//! ```
//! use gateway_protocol::jsonrpc::{JsonRpcRequest, JsonRpcVersion, request_from_wire};
//! use gateway_protocol::validation::validate_message;
//! use serde_json::Value;
//!
//! let req = JsonRpcRequest {
//!     jsonrpc: JsonRpcVersion,
//!     id: Value::String("1".into()),
//!     method: "ping".into(),
//!     params: None,
//! };
//! let msg = request_from_wire(req, "2025-06-18".into()).unwrap();
//! validate_message(&msg).unwrap();
//! ```

pub mod error;
pub mod jsonrpc;
pub mod message;
pub mod method;
pub mod validation;

pub use error::{FramingError, McpError};
pub use message::{McpErrorMessage, McpMessage, McpNotification, McpRequest, McpResponse, MessageId, ProtocolVersion};
pub use method::McpMethod;
