//! Server-facing error type and the HTTP-status / JSON-RPC-code mapping the
//! ingress handlers use to answer every dialect consistently.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gateway_protocol::error::FramingError;
use gateway_session::SessionError;
use gateway_transport_traits::TransportError;
use serde::Serialize;

/// Result type for gateway-server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Every error an ingress handler can surface, already carrying enough
/// information to pick both an HTTP status and (where applicable) a
/// JSON-RPC 2.0 error code.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Malformed envelope: not JSON-RPC 2.0, oversized, or an empty batch.
    /// These never reach a method handler, so the response carries no JSON-RPC
    /// envelope at all.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// The method named by a well-formed request does not exist, its params
    /// failed validation, or the handler itself returned an application
    /// error. All three still produced a valid JSON-RPC transaction, so the
    /// response is HTTP 200 with a JSON-RPC error body.
    #[error("rpc error: {0}")]
    Rpc(FramingError),

    /// A transport-layer failure: connection refused, send/receive failed,
    /// upstream unreachable, or a timeout at one of the transport's stages.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session named by `X-Session-ID` (or implied by the route) could
    /// not be resolved, has expired, or was already closed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The gateway is tearing down and is no longer accepting new work.
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Anything that doesn't fit the above and indicates a gateway bug
    /// rather than a caller or upstream mistake.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Wrap a [`FramingError`] that occurred *after* a request was
    /// successfully parsed and routed — method-not-found, invalid-params, or
    /// an application failure from the handler — as opposed to a malformed
    /// envelope. See [`ServerError::Rpc`].
    pub fn rpc(err: FramingError) -> Self {
        Self::Rpc(err)
    }

    /// Build an internal error from any displayable cause.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a client retrying the same request might succeed without any
    /// change on their end (timeouts, transient upstream unavailability).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(
                TransportError::Timeout
                    | TransportError::ConnectionTimeout { .. }
                    | TransportError::RequestTimeout { .. }
                    | TransportError::TotalTimeout { .. }
                    | TransportError::ReadTimeout { .. }
                    | TransportError::ConnectionLost(_)
                    | TransportError::NotAvailable(_)
            )
        )
    }

    /// Whether this error reflects a bug in the gateway itself rather than
    /// caller or upstream behavior.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// The JSON-RPC 2.0 error code to place in a response body, when the
    /// error is one that still produces a JSON-RPC envelope (§7: framing
    /// errors that never reached a handler do not get one).
    #[must_use]
    pub fn jsonrpc_code(&self) -> i32 {
        match self {
            Self::Framing(e) | Self::Rpc(e) => e.code() as i32,
            Self::Transport(_) => -32000,
            Self::Session(_) => -32000,
            Self::ShuttingDown => -32000,
            Self::Internal(_) => -32603,
        }
    }

    /// The HTTP status line this error should be answered with, per §7's
    /// error-handling table.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Framing(_) => StatusCode::BAD_REQUEST,
            // Method-not-found / invalid-params / application failure are
            // still a successful HTTP transaction carrying a JSON-RPC error.
            Self::Rpc(_) => StatusCode::OK,
            Self::Transport(e) => transport_status(e),
            Self::Session(e) => session_status(e),
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn transport_status(err: &TransportError) -> StatusCode {
    match err {
        TransportError::Timeout { .. }
        | TransportError::ConnectionTimeout { .. }
        | TransportError::RequestTimeout { .. }
        | TransportError::TotalTimeout { .. }
        | TransportError::ReadTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        TransportError::ConnectionFailed(_)
        | TransportError::ConnectionLost(_)
        | TransportError::NotAvailable(_) => StatusCode::BAD_GATEWAY,
        TransportError::RequestTooLarge { .. } | TransportError::ResponseTooLarge { .. } => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        TransportError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
        TransportError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::NotFound(_) => StatusCode::BAD_REQUEST,
        SessionError::Expired(_) => StatusCode::GONE,
        SessionError::Closed(_) => StatusCode::BAD_REQUEST,
        SessionError::IdTooLong { .. } => StatusCode::BAD_REQUEST,
    }
}

/// The minimal JSON body a non-JSON-RPC route (SSE/WebSocket/STDIO control
/// endpoints) answers with on failure.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'a str>,
}

impl ServerError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Rpc(_) => "rpc",
            Self::Transport(_) => "transport",
            Self::Session(_) => "session",
            Self::ShuttingDown => "shutdown",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.jsonrpc_code(),
                message: crate::error_sanitization::sanitize_error_message(&self.to_string()),
                kind: Some(self.kind()),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_errors_are_bad_request_with_no_handler_reached() {
        let err = ServerError::Framing(FramingError::EmptyBatch);
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn method_not_found_is_http_200_with_minus_32601() {
        let err = ServerError::rpc(FramingError::MethodNotFound {
            method: "bogus/method".into(),
        });
        assert_eq!(err.http_status(), StatusCode::OK);
        assert_eq!(err.jsonrpc_code(), -32601);
    }

    #[test]
    fn expired_session_is_gone() {
        let err = ServerError::Session(SessionError::Expired("mcp-abc".into()));
        assert_eq!(err.http_status(), StatusCode::GONE);
    }

    #[test]
    fn timeout_is_retryable_and_fatal_errors_are_not() {
        let timeout = ServerError::Transport(TransportError::Timeout);
        assert!(timeout.is_retryable());
        let internal = ServerError::internal("unreachable state");
        assert!(internal.is_fatal());
        assert!(!internal.is_retryable());
    }
}
