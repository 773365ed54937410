//! JSON-RPC 2.0 wire encoding and decoding.
//!
//! These types are the wire format; [`crate::message::McpMessage`] is the
//! in-core shape every transport driver and the session manager actually work
//! with. Conversion happens at the edge, once, rather than letting every
//! consumer re-derive "is this a request or a response" from optional fields.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FramingError, McpError};
use crate::message::{McpMessage, MessageId, ProtocolVersion};

/// The literal `"2.0"` marker, enforced at (de)serialization time rather than
/// left as a plain `String` field callers could set to anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected JSON-RPC version \"2.0\", got {s:?}"
            )))
        }
    }
}

/// A raw JSON-RPC 2.0 request as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Request id; must be present for a request (absent implies notification).
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Named or positional parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A raw JSON-RPC 2.0 notification (no `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Method name.
    pub method: String,
    /// Named or positional parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A raw JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<McpError> for JsonRpcError {
    fn from(e: McpError) -> Self {
        Self {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

impl From<JsonRpcError> for McpError {
    fn from(e: JsonRpcError) -> Self {
        Self {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

/// The mutually-exclusive success/error payload of a response.
///
/// `#[serde(untagged)]` plus the two variant shapes enforces "exactly one of
/// `result`/`error`" at the type level instead of a runtime check after
/// deserializing a struct with two `Option` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    /// Successful outcome.
    Success {
        /// The result value.
        result: Value,
    },
    /// Failed outcome.
    Error {
        /// The error object.
        error: JsonRpcError,
    },
}

/// A raw JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Echoes the request id (`null` if the request itself was unparseable).
    pub id: Value,
    /// The success/error payload.
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
}

/// A homogeneous JSON-RPC batch. Serializes/deserializes transparently as a
/// JSON array; an empty batch is rejected by [`crate::validation`], not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonRpcBatch<T>(pub Vec<T>);

/// Well-known JSON-RPC 2.0 / gateway error codes, for constructing
/// [`JsonRpcError`] values without repeating magic numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    /// -32600
    InvalidRequest,
    /// -32601
    MethodNotFound,
    /// -32602
    InvalidParams,
    /// -32603
    InternalError,
    /// -32700
    ParseError,
    /// -32000, the gateway's application-error fallback.
    ApplicationError,
}

impl JsonRpcErrorCode {
    /// The numeric code.
    pub fn code(self) -> i64 {
        match self {
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ParseError => -32700,
            Self::ApplicationError => -32000,
        }
    }

    /// The canonical short message for this code.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ParseError => "Parse error",
            Self::ApplicationError => "Application error",
        }
    }
}

impl From<JsonRpcErrorCode> for JsonRpcError {
    fn from(code: JsonRpcErrorCode) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: None,
        }
    }
}

fn id_to_message_id(id: &Value) -> MessageId {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn params_to_map(params: Option<Value>) -> HashMap<String, Value> {
    match params {
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(other) => {
            let mut map = HashMap::new();
            map.insert("_".to_string(), other);
            map
        }
        None => HashMap::new(),
    }
}

/// Parse a raw JSON-RPC request into the canonical [`McpMessage::Request`].
pub fn request_from_wire(
    req: JsonRpcRequest,
    version: ProtocolVersion,
) -> Result<McpMessage, FramingError> {
    if req.id.is_null() {
        return Err(FramingError::InvalidRequest {
            reason: "request id must not be null".to_string(),
        });
    }
    Ok(McpMessage::request(
        id_to_message_id(&req.id),
        req.method,
        version,
        params_to_map(req.params),
    ))
}

/// Parse a raw JSON-RPC notification into [`McpMessage::Notification`].
pub fn notification_from_wire(
    note: JsonRpcNotification,
    version: ProtocolVersion,
    id: MessageId,
) -> McpMessage {
    McpMessage::notification(id, note.method, version, params_to_map(note.params))
}

/// Encode a canonical [`McpMessage`] back onto the wire, where applicable.
///
/// Requests/notifications round-trip losslessly; responses and errors carry
/// their id as a JSON string (the gateway's ids are opaque strings, never
/// numeric, by construction — see [`crate::message::MessageId`]).
pub fn message_to_wire_request(msg: &McpMessage) -> Option<JsonRpcRequest> {
    match msg {
        McpMessage::Request(r) => Some(JsonRpcRequest {
            jsonrpc: JsonRpcVersion,
            id: Value::String(r.id.clone()),
            method: r.method.clone(),
            params: Some(Value::Object(r.params.clone().into_iter().collect())),
        }),
        _ => None,
    }
}

/// Encode a response/error [`McpMessage`] as a [`JsonRpcResponse`].
pub fn message_to_wire_response(msg: &McpMessage) -> Option<JsonRpcResponse> {
    match msg {
        McpMessage::Response(r) => Some(JsonRpcResponse {
            jsonrpc: JsonRpcVersion,
            id: Value::String(r.id.clone()),
            payload: JsonRpcResponsePayload::Success {
                result: Value::Object(r.result.clone().into_iter().collect()),
            },
        }),
        McpMessage::Error(e) => Some(JsonRpcResponse {
            jsonrpc: JsonRpcVersion,
            id: Value::String(e.id.clone()),
            payload: JsonRpcResponsePayload::Error {
                error: e.error.clone().into(),
            },
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_rejects_anything_but_2_0() {
        let ok: Result<JsonRpcVersion, _> = serde_json::from_str("\"2.0\"");
        assert!(ok.is_ok());
        let bad: Result<JsonRpcVersion, _> = serde_json::from_str("\"1.0\"");
        assert!(bad.is_err());
    }

    #[test]
    fn request_with_null_id_is_rejected() {
        let req = JsonRpcRequest {
            jsonrpc: JsonRpcVersion,
            id: Value::Null,
            method: "ping".into(),
            params: None,
        };
        let err = request_from_wire(req, "2025-06-18".into()).unwrap_err();
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn response_payload_is_mutually_exclusive() {
        let success = JsonRpcResponsePayload::Success {
            result: Value::Bool(true),
        };
        let json = serde_json::to_value(&success).unwrap();
        assert!(json.get("result").is_some());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn round_trips_a_request_through_the_canonical_shape() {
        let req = JsonRpcRequest {
            jsonrpc: JsonRpcVersion,
            id: Value::String("abc".into()),
            method: "tools/list".into(),
            params: None,
        };
        let msg = request_from_wire(req, "2025-06-18".into()).unwrap();
        assert_eq!(msg.id(), "abc");
        let wire = message_to_wire_request(&msg).unwrap();
        assert_eq!(wire.method, "tools/list");
    }
}
