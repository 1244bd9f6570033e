//! Frame header and frame type.
//!
//! A frame is a fixed 16-byte header followed by up to [`MAX_PAYLOAD_SIZE`]
//! bytes of payload. This module is a pure codec: it knows how to turn a
//! header/frame into bytes and back, and nothing about sockets or timeouts
//! (that lives in [`crate::io`]).

use bytes::Bytes;

use crate::{
    byte,
    error::{ProtocolError, Result},
};

/// Serialized size of a frame header.
pub const HEADER_SIZE: usize = 16;

/// The four magic octets that open every frame.
pub const MAGIC: [u8; 4] = *b"CEQP";

/// The only protocol version this crate understands.
pub const VERSION: u8 = 1;

/// Maximum payload size in bytes (1 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

/// Fixed 16-byte frame header.
///
/// Wire layout (all multi-byte integers little-endian):
/// `magic[4] version[1] type[1] flags[1] reserved[1] request_id[4] payload_len[4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Opcode byte identifying the request or response kind.
    pub frame_type: u8,
    /// Flags byte. Must be `0` on send; ignored on receive.
    pub flags: u8,
    /// Reserved byte. Must be `0` on send; ignored on receive.
    pub reserved: u8,
    /// Client-assigned request identifier, echoed verbatim in the response.
    pub request_id: u32,
    /// Payload length in bytes.
    pub payload_len: u32,
}

impl FrameHeader {
    /// Build a header for `frame_type` carrying `request_id`, with the
    /// given `payload_len`. `flags`/`reserved` are always `0` on send.
    #[must_use]
    pub fn new(frame_type: u8, request_id: u32, payload_len: u32) -> Self {
        Self { frame_type, flags: 0, reserved: 0, request_id, payload_len }
    }

    /// Serialize to the 16-byte wire representation.
    #[must_use]
    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = VERSION;
        out[5] = self.frame_type;
        out[6] = self.flags;
        out[7] = self.reserved;
        out[8..12].copy_from_slice(&self.request_id.to_le_bytes());
        out[12..16].copy_from_slice(&self.payload_len.to_le_bytes());
        out
    }

    /// Parse a header from exactly [`HEADER_SIZE`] bytes.
    ///
    /// Validates magic, version, and the payload-size ceiling before
    /// allocating anything downstream — cheapest checks first.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::FrameTooShort`] if `bytes.len() != HEADER_SIZE`
    /// - [`ProtocolError::InvalidMagic`] if the magic octets don't match
    /// - [`ProtocolError::UnsupportedVersion`] if the version byte isn't 1
    /// - [`ProtocolError::PayloadTooLarge`] if `payload_len` exceeds the cap
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(ProtocolError::FrameTooShort { expected: HEADER_SIZE, actual: bytes.len() });
        }

        if bytes[0..4] != MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        // request_id sits at a fixed offset present in every 16-byte header
        // regardless of version/payload_len, so it's readable even when the
        // frame is about to be rejected for one of those reasons.
        let request_id = byte::read_u32(&bytes[8..12]);

        let version = bytes[4];
        if version != VERSION {
            return Err(ProtocolError::UnsupportedVersion { version, request_id });
        }

        let payload_len = byte::read_u32(&bytes[12..16]);
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len as usize,
                max: MAX_PAYLOAD_SIZE as usize,
                request_id,
            });
        }

        Ok(Self {
            frame_type: bytes[5],
            flags: bytes[6],
            reserved: bytes[7],
            request_id: byte::read_u32(&bytes[8..12]),
            payload_len,
        })
    }
}

/// A complete frame: header plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header. `payload_len` always matches `payload.len()`.
    pub header: FrameHeader,
    /// Payload bytes, already TLV-encoded (or empty).
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame, computing `payload_len` from `payload`.
    ///
    /// # Panics
    ///
    /// Panics if `payload.len() > u32::MAX`. This cannot happen in practice:
    /// the dispatcher never builds a payload anywhere near 4 GiB, and
    /// [`Frame::encode`] separately rejects anything over
    /// [`MAX_PAYLOAD_SIZE`] (1 MiB).
    #[must_use]
    pub fn new(frame_type: u8, request_id: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        #[allow(clippy::expect_used)]
        let payload_len = u32::try_from(payload.len()).expect("payload fits in u32");
        Self { header: FrameHeader::new(frame_type, request_id, payload_len), payload }
    }

    /// Encode this frame to its wire bytes (header followed by payload).
    ///
    /// # Errors
    ///
    /// [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD_SIZE as usize,
                request_id: self.header.request_id,
            });
        }

        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Decode a frame from a header plus its exact payload bytes.
    ///
    /// The caller (see [`crate::io`]) is responsible for reading exactly
    /// `header.payload_len` bytes before calling this; this function only
    /// asserts that invariant, it does not read from any stream itself.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::FrameTruncated`] if `payload.len()` doesn't match
    /// `header.payload_len`.
    pub fn from_parts(header: FrameHeader, payload: Bytes) -> Result<Self> {
        if payload.len() != header.payload_len as usize {
            return Err(ProtocolError::FrameTruncated {
                expected: header.payload_len as usize,
                actual: payload.len(),
            });
        }
        Ok(Self { header, payload })
    }
}
