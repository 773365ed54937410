//! Session-layer errors.

use thiserror::Error;

/// Errors raised by [`crate::manager::SessionManager`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    /// No session exists with the given id.
    #[error("session {0} not found")]
    NotFound(String),

    /// The session exists but its idle timeout has elapsed.
    #[error("session {0} expired")]
    Expired(String),

    /// The session exists but has already been explicitly closed.
    #[error("session {0} is closed")]
    Closed(String),

    /// The supplied session id exceeds [`crate::session::MAX_SESSION_ID_LEN`].
    #[error("session id exceeds maximum length of {max} bytes")]
    IdTooLong {
        /// The configured maximum.
        max: usize,
    },
}

/// A specialized `Result` for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
