//! The canonical in-core message shape.
//!
//! `McpMessage` is a sealed sum type rather than a dynamically-typed envelope:
//! every driver matches on the variant tag instead of inspecting a generic
//! "type" field at runtime. This is the redesign called out for the
//! dynamic-dispatch pattern in the source system: one constructor per origin
//! (wire JSON-RPC, a raw params map, an opaque forward) feeds the same enum.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::McpError;

/// Opaque message identifier, unique within a session.
pub type MessageId = String;

/// The MCP protocol version string negotiated for a message (e.g. `"2025-06-18"`).
pub type ProtocolVersion = String;

/// A request, response, notification, or error in the gateway's canonical form.
#[derive(Debug, Clone, PartialEq)]
pub enum McpMessage {
    /// A request expecting a matching response.
    Request(McpRequest),
    /// A successful response to a prior request.
    Response(McpResponse),
    /// A one-way notification; no response is expected.
    Notification(McpNotification),
    /// An error response to a prior request.
    Error(McpErrorMessage),
}

/// A request message: `method`/`params` present, exactly one of `result`/`error` absent.
#[derive(Debug, Clone, PartialEq)]
pub struct McpRequest {
    /// Unique, non-empty id.
    pub id: MessageId,
    /// Method name, e.g. `"tools/call"`.
    pub method: String,
    /// Negotiated protocol version.
    pub version: ProtocolVersion,
    /// Named parameters.
    pub params: HashMap<String, Value>,
}

/// A successful response carrying a result map.
#[derive(Debug, Clone, PartialEq)]
pub struct McpResponse {
    /// Id matching the originating request.
    pub id: MessageId,
    /// Negotiated protocol version.
    pub version: ProtocolVersion,
    /// The result payload.
    pub result: HashMap<String, Value>,
}

/// A one-way notification; carries no response-bearing id semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct McpNotification {
    /// Notification id (opaque, used only for correlation in logs/events).
    pub id: MessageId,
    /// Method name, e.g. `"notifications/progress"`.
    pub method: String,
    /// Negotiated protocol version.
    pub version: ProtocolVersion,
    /// Named parameters.
    pub params: HashMap<String, Value>,
}

/// An error response to a prior request.
#[derive(Debug, Clone, PartialEq)]
pub struct McpErrorMessage {
    /// Id matching the originating request.
    pub id: MessageId,
    /// Negotiated protocol version.
    pub version: ProtocolVersion,
    /// The JSON-RPC error body.
    pub error: McpError,
}

impl McpMessage {
    /// The id shared by every variant.
    pub fn id(&self) -> &str {
        match self {
            Self::Request(r) => &r.id,
            Self::Response(r) => &r.id,
            Self::Notification(n) => &n.id,
            Self::Error(e) => &e.id,
        }
    }

    /// The negotiated protocol version carried by every variant.
    pub fn version(&self) -> &str {
        match self {
            Self::Request(r) => &r.version,
            Self::Response(r) => &r.version,
            Self::Notification(n) => &n.version,
            Self::Error(e) => &e.version,
        }
    }

    /// Short name of the variant, used for event/metric tagging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::Notification(_) => "notification",
            Self::Error(_) => "error",
        }
    }

    /// The method name, if this variant carries one (request/notification).
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) | Self::Error(_) => None,
        }
    }

    /// Construct a request.
    pub fn request(
        id: impl Into<MessageId>,
        method: impl Into<String>,
        version: impl Into<ProtocolVersion>,
        params: HashMap<String, Value>,
    ) -> Self {
        Self::Request(McpRequest {
            id: id.into(),
            method: method.into(),
            version: version.into(),
            params,
        })
    }

    /// Construct a successful response.
    pub fn response(
        id: impl Into<MessageId>,
        version: impl Into<ProtocolVersion>,
        result: HashMap<String, Value>,
    ) -> Self {
        Self::Response(McpResponse {
            id: id.into(),
            version: version.into(),
            result,
        })
    }

    /// Construct an error response.
    pub fn error(id: impl Into<MessageId>, version: impl Into<ProtocolVersion>, error: McpError) -> Self {
        Self::Error(McpErrorMessage {
            id: id.into(),
            version: version.into(),
            error,
        })
    }

    /// Construct a notification.
    pub fn notification(
        id: impl Into<MessageId>,
        method: impl Into<String>,
        version: impl Into<ProtocolVersion>,
        params: HashMap<String, Value>,
    ) -> Self {
        Self::Notification(McpNotification {
            id: id.into(),
            method: method.into(),
            version: version.into(),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_its_method() {
        let msg = McpMessage::request("t1", "ping", "2025-06-18", HashMap::new());
        assert_eq!(msg.id(), "t1");
        assert_eq!(msg.method(), Some("ping"));
        assert_eq!(msg.type_name(), "request");
    }

    #[test]
    fn response_has_no_method() {
        let msg = McpMessage::response("t1", "2025-06-18", HashMap::new());
        assert_eq!(msg.method(), None);
        assert_eq!(msg.type_name(), "response");
    }
}
