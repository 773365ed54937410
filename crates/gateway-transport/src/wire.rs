//! The tagged wire form used by the non-HTTP drivers (WebSocket, STDIO,
//! streamable-HTTP).
//!
//! The JSON-RPC/HTTP driver speaks strict JSON-RPC 2.0
//! (`gateway_protocol::jsonrpc`); the other drivers speak a flatter,
//! explicitly-tagged form — `{"id":...,"type":"request","method":...}` — that
//! mirrors [`McpMessage`] directly rather than round-tripping through the
//! JSON-RPC envelope. This is the shape a WebSocket or STDIO peer sends and
//! receives.

use std::collections::HashMap;

use gateway_protocol::{McpError, McpMessage, MessageId, ProtocolVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wire-tagged form of an [`McpMessage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireMessage {
    /// A request expecting a response.
    Request {
        /// Message id.
        id: MessageId,
        /// Method name.
        method: String,
        /// Negotiated protocol version.
        version: ProtocolVersion,
        /// Named parameters.
        #[serde(default)]
        params: HashMap<String, Value>,
    },
    /// A successful response.
    Response {
        /// Message id, matching the originating request.
        id: MessageId,
        /// Negotiated protocol version.
        version: ProtocolVersion,
        /// Result payload.
        #[serde(default)]
        result: HashMap<String, Value>,
    },
    /// A one-way notification.
    Notification {
        /// Message id (correlation only).
        id: MessageId,
        /// Method name.
        method: String,
        /// Negotiated protocol version.
        version: ProtocolVersion,
        /// Named parameters.
        #[serde(default)]
        params: HashMap<String, Value>,
    },
    /// An error response.
    Error {
        /// Message id, matching the originating request.
        id: MessageId,
        /// Negotiated protocol version.
        version: ProtocolVersion,
        /// The JSON-RPC error body.
        error: McpError,
    },
}

impl From<&McpMessage> for WireMessage {
    fn from(msg: &McpMessage) -> Self {
        match msg {
            McpMessage::Request(r) => Self::Request {
                id: r.id.clone(),
                method: r.method.clone(),
                version: r.version.clone(),
                params: r.params.clone(),
            },
            McpMessage::Response(r) => Self::Response {
                id: r.id.clone(),
                version: r.version.clone(),
                result: r.result.clone(),
            },
            McpMessage::Notification(n) => Self::Notification {
                id: n.id.clone(),
                method: n.method.clone(),
                version: n.version.clone(),
                params: n.params.clone(),
            },
            McpMessage::Error(e) => Self::Error {
                id: e.id.clone(),
                version: e.version.clone(),
                error: e.error.clone(),
            },
        }
    }
}

impl From<WireMessage> for McpMessage {
    fn from(wire: WireMessage) -> Self {
        match wire {
            WireMessage::Request { id, method, version, params } => {
                McpMessage::request(id, method, version, params)
            }
            WireMessage::Response { id, version, result } => McpMessage::response(id, version, result),
            WireMessage::Notification { id, method, version, params } => {
                McpMessage::notification(id, method, version, params)
            }
            WireMessage::Error { id, version, error } => McpMessage::error(id, version, error),
        }
    }
}

/// Encode a message as a single line of JSON, no trailing newline.
pub fn encode(msg: &McpMessage) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&WireMessage::from(msg))
}

/// Decode a message from a JSON byte slice.
pub fn decode(bytes: &[u8]) -> serde_json::Result<McpMessage> {
    serde_json::from_slice::<WireMessage>(bytes).map(McpMessage::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_the_tagged_wire_form() {
        let msg = McpMessage::request("w1", "tools/call", "2024-11-05", HashMap::new());
        let bytes = encode(&msg).unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("\"type\":\"request\""));
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn response_round_trips() {
        let msg = McpMessage::response("w1", "2024-11-05", HashMap::new());
        let bytes = encode(&msg).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }
}
