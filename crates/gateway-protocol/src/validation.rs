//! Request/response validation per the gateway's framing contract.
//!
//! A request is well-formed iff it carries a non-empty `id`, a non-empty
//! `method`, and a recognized protocol `version`. A response/error is
//! well-formed iff it carries a non-empty `id` and exactly one of a result or
//! an error body — the sealed [`McpMessage`](crate::message::McpMessage)
//! variants already make "exactly one" a type-level guarantee, so validation
//! here only has to check the shared, checkable-at-runtime fields.

use crate::error::FramingError;
use crate::message::McpMessage;
use crate::method::McpMethod;

/// Protocol versions the gateway will negotiate. Kept as a slice rather than
/// an enum so new versions can be added without a breaking change here.
pub const SUPPORTED_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Maximum size, in bytes, of a single framed message before it is rejected
/// with [`FramingError::TooLarge`].
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024 * 1024;

/// Validate a decoded message against the framing contract.
///
/// This does not validate method-specific parameter shapes (e.g. that
/// `tools/call` carries a `name` field) — that is upstream-server business,
/// out of scope for a transport core that does not execute tools.
pub fn validate_message(msg: &McpMessage) -> Result<(), FramingError> {
    if msg.id().is_empty() {
        return Err(FramingError::InvalidRequest {
            reason: "id must not be empty".to_string(),
        });
    }

    if !SUPPORTED_VERSIONS.contains(&msg.version()) {
        return Err(FramingError::InvalidRequest {
            reason: format!("unsupported protocol version {:?}", msg.version()),
        });
    }

    if let Some(method) = msg.method() {
        if method.is_empty() {
            return Err(FramingError::InvalidRequest {
                reason: "method must not be empty".to_string(),
            });
        }
    }

    Ok(())
}

/// Validate that a raw byte length is within the configured message size
/// limit.
pub fn validate_size(len: usize, limit: usize) -> Result<(), FramingError> {
    if len > limit {
        return Err(FramingError::TooLarge { size: len, limit });
    }
    Ok(())
}

/// Validate a batch is non-empty, per JSON-RPC 2.0.
pub fn validate_batch_nonempty<T>(items: &[T]) -> Result<(), FramingError> {
    if items.is_empty() {
        return Err(FramingError::EmptyBatch);
    }
    Ok(())
}

/// Look up whether a method name is recognized, for routing decisions that
/// care (e.g. whether to apply first-class logging/metrics tags).
pub fn classify_method(method: &str) -> McpMethod {
    McpMethod::parse(method)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn rejects_empty_id() {
        let msg = McpMessage::request("", "ping", "2025-06-18", HashMap::new());
        let err = validate_message(&msg).unwrap_err();
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn rejects_unsupported_version() {
        let msg = McpMessage::request("t1", "ping", "1999-01-01", HashMap::new());
        assert!(validate_message(&msg).is_err());
    }

    #[test]
    fn accepts_well_formed_request() {
        let msg = McpMessage::request("t1", "ping", "2025-06-18", HashMap::new());
        assert!(validate_message(&msg).is_ok());
    }

    #[test]
    fn empty_batch_is_rejected() {
        let items: Vec<McpMessage> = Vec::new();
        assert!(validate_batch_nonempty(&items).is_err());
    }

    #[test]
    fn oversized_message_is_rejected() {
        assert!(validate_size(200, 100).is_err());
        assert!(validate_size(50, 100).is_ok());
    }
}
