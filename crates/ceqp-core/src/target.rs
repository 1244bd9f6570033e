//! The host-facing abstraction over a foreign process's address space.
//!
//! This is deliberately the smallest interface that lets the rest of the
//! crate stay host-agnostic: whatever acquires the real process handle
//! (debugger embedding, simulation harness, demo binary) implements this
//! trait once, and everything above it — module resolution, pointer
//! walking, the dispatcher — works the same way against any of them.

use crate::error::Result;

/// Architecture classification of a target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 32-bit target.
    X86,
    /// 64-bit target.
    X64,
    /// Architecture could not be determined.
    Unknown,
}

impl Arch {
    /// The architecture this server binary itself was compiled for, used to
    /// select the memory access path in [`crate::memory::select_path`].
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(target_pointer_width = "64") {
            Self::X64
        } else {
            Self::X86
        }
    }
}

/// A handle to a foreign process's virtual address space.
///
/// Implementations must be safe to call from the session's I/O task; they
/// are not required to be lock-free, only to not deadlock against
/// themselves (the dispatcher never holds two references into the same
/// target concurrently).
pub trait TargetProcess: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `address`.
    ///
    /// Returns the number of bytes actually copied into `buf`. A short
    /// read (fewer bytes than requested) is not an error — the caller
    /// truncates the response accordingly — but a read that transfers
    /// zero bytes because the address is entirely unmapped should return
    /// [`crate::error::CoreError::ReadFailed`].
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<usize>;

    /// Write `data` starting at `address`.
    ///
    /// Returns the number of bytes actually written. Unlike `read`, a
    /// short write is reported as [`crate::error::CoreError::WriteFailed`]
    /// by the caller (see [`crate::memory`]) rather than treated as
    /// partial success.
    fn write(&self, address: u64, data: &[u8]) -> Result<usize>;

    /// This target's architecture, cached by the implementation and
    /// refreshed only when a new handle is acquired.
    fn arch(&self) -> Arch;
}

impl<T: TargetProcess + ?Sized> TargetProcess for &T {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read(address, buf)
    }

    fn write(&self, address: u64, data: &[u8]) -> Result<usize> {
        (**self).write(address, data)
    }

    fn arch(&self) -> Arch {
        (**self).arch()
    }
}

/// A snapshot of the modules currently loaded in a target process.
pub trait HostModules {
    /// Enumerate every loaded module (both 32-bit and 64-bit loads, on
    /// platforms that distinguish them).
    fn modules(&self) -> Vec<crate::module::ModuleEntry>;
}
