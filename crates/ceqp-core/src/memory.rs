//! Cross-architecture memory access layer.
//!
//! This module doesn't talk to an operating system itself — it adapts a
//! host-supplied [`TargetProcess`] to the read/write contract the dispatcher
//! needs (truncated reads, hard-failing writes), and selects between the
//! native and cross-bitness access paths per the table below.
//!
//! | Server | Target | Path |
//! |---|---|---|
//! | 64-bit | 64-bit | Native |
//! | 64-bit | 32-bit | Native (truncate addresses ≥ 2³²) |
//! | 32-bit | 32-bit | Native |
//! | 32-bit | 64-bit | Cross-bitness syscall path |
//! | 32-bit | 64-bit, unavailable | [`CoreError::CrossArchUnsupported`] |

use crate::{
    error::{CoreError, Result},
    target::{Arch, TargetProcess},
};

/// The access path a given (server, target) architecture pair requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPath {
    /// The server can address the target's memory directly.
    Native,
    /// The server needs the platform's cross-bitness syscall facility.
    CrossBitness,
}

/// Select the access path for `server_arch` accessing a target of
/// `target_arch`, per the table in this module's docs.
#[must_use]
pub fn select_path(server_arch: Arch, target_arch: Arch) -> AccessPath {
    match (server_arch, target_arch) {
        (Arch::X86, Arch::X64) => AccessPath::CrossBitness,
        _ => AccessPath::Native,
    }
}

/// Wraps a host-supplied [`TargetProcess`] for the native-bitness access
/// path. Addresses are truncated to 32 bits when the target itself is
/// 32-bit, matching the "Native (truncate addresses ≥ 2³²)" row above.
pub struct NativeTarget<T> {
    inner: T,
}

impl<T: TargetProcess> NativeTarget<T> {
    /// Wrap `inner` for native-bitness access.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    fn normalize(&self, address: u64) -> u64 {
        if self.inner.arch() == Arch::X86 {
            address & u64::from(u32::MAX)
        } else {
            address
        }
    }
}

impl<T: TargetProcess> TargetProcess for NativeTarget<T> {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(self.normalize(address), buf)
    }

    fn write(&self, address: u64, data: &[u8]) -> Result<usize> {
        self.inner.write(self.normalize(address), data)
    }

    fn arch(&self) -> Arch {
        self.inner.arch()
    }
}

/// Wraps a host-supplied [`TargetProcess`] for the cross-bitness access
/// path. Constructed as [`CrossBitnessTarget::unavailable`] when the host
/// platform doesn't expose the required syscall facility; every access
/// then fails with [`CoreError::CrossArchUnsupported`] instead of silently
/// truncating the address.
pub struct CrossBitnessTarget<T> {
    inner: Option<T>,
}

impl<T: TargetProcess> CrossBitnessTarget<T> {
    /// The cross-bitness facility is available and backed by `inner`.
    pub fn available(inner: T) -> Self {
        Self { inner: Some(inner) }
    }

    /// The cross-bitness facility is not available on this host.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { inner: None }
    }
}

impl<T: TargetProcess> TargetProcess for CrossBitnessTarget<T> {
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        self.inner.as_ref().ok_or(CoreError::CrossArchUnsupported)?.read(address, buf)
    }

    fn write(&self, address: u64, data: &[u8]) -> Result<usize> {
        self.inner.as_ref().ok_or(CoreError::CrossArchUnsupported)?.write(address, data)
    }

    fn arch(&self) -> Arch {
        self.inner.as_ref().map_or(Arch::Unknown, TargetProcess::arch)
    }
}

/// Read exactly up to `len` bytes at `address`.
///
/// Short reads truncate the returned buffer rather than erroring (per
/// invariant 6); a read that transfers zero bytes because nothing is
/// mapped there surfaces as [`CoreError::ReadFailed`].
pub fn read_exact_or_truncated(
    target: &dyn TargetProcess,
    address: u64,
    len: u32,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len as usize];
    let n = target.read(address, &mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

/// Write `data` at `address` in full.
///
/// A partial write is a hard failure, not a truncated success.
pub fn write_full(target: &dyn TargetProcess, address: u64, data: &[u8]) -> Result<()> {
    let written = target.write(address, data)?;
    if written != data.len() {
        return Err(CoreError::WriteFailed { address, written, requested: data.len() });
    }
    Ok(())
}
