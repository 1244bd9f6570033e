//! Wire codec for the Cheat Engine Query Protocol.
//!
//! This crate is the Sans-IO half of the protocol: byte-level helpers,
//! TLV encoding/decoding, the frame header/body format, and the opcode
//! table. The only I/O-aware piece is [`io`], which wraps frame
//! read/write in the shared idle timeout so the server and client can't
//! disagree on how long to wait for a peer.

pub mod byte;
pub mod error;
pub mod frame;
pub mod io;
pub mod opcode;
pub mod tlv;

pub use error::{ProtocolError, Result};
pub use frame::{Frame, FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use io::{read_frame, write_frame, IO_TIMEOUT};
pub use opcode::Opcode;
pub use tlv::{tag, Record};
