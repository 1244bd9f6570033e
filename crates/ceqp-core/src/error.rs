//! Target-access error types.
//!
//! Wire-framing errors live in `ceqp_proto::ProtocolError`; this crate only
//! deals with failures that occur once a frame has already been decoded and
//! we're touching the target process itself (module lookup, memory
//! read/write, pointer-chain walking).

use thiserror::Error;

use crate::pointer::WalkErrorKind;

/// Errors produced by module resolution, memory access, and pointer walking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No loaded module matched the requested name.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// A read against the target process failed outright (not a short
    /// read — those are reported as a truncated byte count, not an error).
    #[error("read failed at {address:#x} ({len} bytes)")]
    ReadFailed {
        /// Address the read was attempted at.
        address: u64,
        /// Requested length.
        len: u32,
    },

    /// A write against the target process did not transfer every byte.
    #[error("write failed at {address:#x}: wrote {written} of {requested} bytes")]
    WriteFailed {
        /// Address the write was attempted at.
        address: u64,
        /// Bytes actually written.
        written: usize,
        /// Bytes requested to be written.
        requested: usize,
    },

    /// The target's architecture requires the cross-bitness syscall path,
    /// and that path is not available on this host.
    #[error("cross-architecture memory access is unsupported on this host")]
    CrossArchUnsupported,

    /// Pointer-chain walk aborted partway through.
    #[error("pointer walk failed at step {step} (address {address:#x}): {kind}")]
    PointerWalk {
        /// Zero-based offset index where the walk stopped.
        step: usize,
        /// Address the walk was at when it failed.
        address: u64,
        /// What went wrong at that step.
        kind: WalkErrorKind,
    },
}

/// Convenience alias for results returning [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<crate::pointer::WalkError> for CoreError {
    fn from(err: crate::pointer::WalkError) -> Self {
        Self::PointerWalk { step: err.step, address: err.address, kind: err.kind }
    }
}
