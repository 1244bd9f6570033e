//! Server error types.
//!
//! Wraps wire-level and target-access errors, plus the resource errors that
//! can occur at startup (failed bind/listen).

use std::fmt;

/// Errors that can occur while running the server.
#[derive(Debug)]
pub enum ServerError {
    /// The listener could not be bound. `start` returns failure; no session
    /// is ever created.
    Bind(String),

    /// A frame failed to decode or encode.
    Protocol(ceqp_proto::ProtocolError),

    /// A target-access operation failed while handling a request.
    Core(ceqp_core::CoreError),

    /// A socket I/O error occurred outside the framed read/write path
    /// (accept, shutdown).
    Io(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(msg) => write!(f, "bind failed: {msg}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Core(err) => write!(f, "target-access error: {err}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ceqp_proto::ProtocolError> for ServerError {
    fn from(err: ceqp_proto::ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<ceqp_core::CoreError> for ServerError {
    fn from(err: ceqp_core::CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
