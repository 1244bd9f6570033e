//! Wire-level error types.
//!
//! These cover framing violations (bad magic, bad version, oversize or
//! truncated payloads) and TLV decode failures (missing fields, wrong
//! widths, malformed arrays). Target-access failures (module not found,
//! read/write failed, pointer-walk errors) live in `ceqp-core` instead —
//! this crate only knows about bytes on the wire.

use thiserror::Error;

/// Errors produced while encoding or decoding CEQP frames and TLV payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Header magic did not match `"CEQP"`.
    #[error("invalid magic number")]
    InvalidMagic,

    /// Header version byte was not `1`.
    #[error("unsupported protocol version: {version}")]
    UnsupportedVersion {
        /// The unsupported version byte found in the header.
        version: u8,
        /// The header's `request_id`, so the caller can echo it in its
        /// `ERROR_RESP`. Always readable: it sits at a fixed offset present
        /// in every 16-byte header regardless of the version byte's value.
        request_id: u32,
    },

    /// `payload_len` exceeded [`crate::frame::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Declared or actual payload size.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
        /// The header's `request_id`, so the caller can echo it in its
        /// `ERROR_RESP`.
        request_id: u32,
    },

    /// Fewer bytes were available than the header's `payload_len` claimed.
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload size declared by the header.
        expected: usize,
        /// Payload bytes actually available.
        actual: usize,
    },

    /// Fewer than 16 bytes were available to parse a header.
    #[error("frame header too short: expected {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected header size (always 16).
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A required TLV tag was absent from the payload.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A typed TLV field had the wrong byte width for its type.
    #[error("field {name} has wrong width: expected {expected} bytes, got {actual}")]
    WrongFieldWidth {
        /// Name of the field, for diagnostics.
        name: &'static str,
        /// Expected byte width.
        expected: usize,
        /// Actual byte width found.
        actual: usize,
    },

    /// `OFFSETS` length was not a multiple of 8.
    #[error("OFFSETS length {0} is not a multiple of 8")]
    MalformedOffsets(usize),

    /// The opcode in a frame header did not match any known request type.
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// A string-typed TLV field contained non-UTF-8 bytes.
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    /// A read or write did not complete within the idle timeout.
    #[error("I/O timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The underlying socket returned an I/O error (includes EOF as a short
    /// read, reported through [`std::io::ErrorKind::UnexpectedEof`]).
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Convenience alias for results returning [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;
