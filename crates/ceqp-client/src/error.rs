//! Client-side error type.

use thiserror::Error;

/// Errors surfaced by [`crate::client::Client`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The TCP connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// A frame failed to encode, decode, or arrived malformed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ceqp_proto::ProtocolError),

    /// The server answered with `ERROR_RESP`.
    #[error("server reported error {code}: {message}")]
    Server {
        /// Reserved numeric error code from the `ERRCODE` tag.
        code: u32,
        /// Diagnostic message from the `ERRMSG` tag.
        message: String,
    },

    /// A response carried an opcode the caller didn't request.
    #[error("unexpected response opcode: {0:#04x}")]
    UnexpectedOpcode(u8),
}

/// Convenience alias for results returning [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;
