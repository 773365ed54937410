//! JSON-RPC 2.0 error taxonomy for the gateway's message framing layer.
//!
//! This is deliberately narrow: the gateway does not implement MCP semantic
//! handlers (tool execution, prompt rendering, sampling), so it has no need
//! for the rich per-feature error codes those handlers would raise. What it
//! does own is the wire-level contract — malformed requests, unknown
//! methods, bad params, and the catch-all application error the spec reserves
//! for everything else.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 error object, ready to serialize onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    /// The numeric JSON-RPC error code.
    pub code: i64,
    /// A short, human-readable summary.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    /// Build an error from a [`FramingError`], carrying its code and message.
    pub fn from_framing(err: &FramingError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            data: err.data(),
        }
    }

    /// Build an application-level error (-32000) with a caller-supplied message.
    pub fn application(message: impl Into<String>) -> Self {
        Self {
            code: -32000,
            message: message.into(),
            data: None,
        }
    }
}

/// Framing-layer failures: the ways a message can fail before it ever reaches
/// a transport driver or an upstream server.
///
/// Each variant maps to exactly one JSON-RPC 2.0 error code: -32600 invalid
/// request, -32601 method not found, -32602 invalid params, -32000 as the
/// application-error fallback.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum FramingError {
    /// The envelope is missing a required field or violates the JSON-RPC 2.0
    /// shape (e.g. both `result` and `error` present, or neither).
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What made the envelope invalid.
        reason: String,
    },

    /// The declared method is not one the gateway recognizes.
    #[error("method not found: {method}")]
    MethodNotFound {
        /// The unrecognized method name.
        method: String,
    },

    /// Parameters failed to deserialize into the shape the method expects.
    #[error("invalid params for {method}: {reason}")]
    InvalidParams {
        /// The method whose params were rejected.
        method: String,
        /// Why the params were rejected.
        reason: String,
    },

    /// The message body exceeded the configured size limit before framing
    /// could complete.
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// The size of the offending message.
        size: usize,
        /// The configured limit.
        limit: usize,
    },

    /// A batch contained no entries, which JSON-RPC 2.0 prohibits.
    #[error("empty batch")]
    EmptyBatch,

    /// Any failure not covered by a narrower variant; surfaces as the
    /// application-error code.
    #[error("{0}")]
    Application(String),
}

impl FramingError {
    /// The JSON-RPC 2.0 error code this variant maps to.
    pub fn code(&self) -> i64 {
        match self {
            Self::InvalidRequest { .. } | Self::EmptyBatch => -32600,
            Self::MethodNotFound { .. } => -32601,
            Self::InvalidParams { .. } => -32602,
            Self::TooLarge { .. } | Self::Application(_) => -32000,
        }
    }

    /// Structured data to attach to the wire error, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::TooLarge { size, limit } => Some(serde_json::json!({
                "size": size,
                "limit": limit,
            })),
            _ => None,
        }
    }
}

impl From<FramingError> for McpError {
    fn from(err: FramingError) -> Self {
        McpError::from_framing(&err)
    }
}

impl From<serde_json::Error> for FramingError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_found_maps_to_32601() {
        let err = FramingError::MethodNotFound {
            method: "tools/frobnicate".into(),
        };
        assert_eq!(err.code(), -32601);
    }

    #[test]
    fn invalid_params_maps_to_32602() {
        let err = FramingError::InvalidParams {
            method: "tools/call".into(),
            reason: "missing `name`".into(),
        };
        assert_eq!(err.code(), -32602);
        let wire: McpError = err.into();
        assert_eq!(wire.code, -32602);
    }

    #[test]
    fn too_large_carries_structured_data() {
        let err = FramingError::TooLarge { size: 200, limit: 100 };
        let wire = McpError::from_framing(&err);
        assert_eq!(wire.code, -32000);
        assert!(wire.data.is_some());
    }
}
