//! Cheat Engine-semantic pointer-chain walking.
//!
//! Each step dereferences the current address *first*, then adds the next
//! offset — including at step 0, where the base itself is dereferenced.
//! This is the opposite of the naive "add offset, then dereference" reading
//! and must be exact: it's the one piece of this crate most likely to be
//! silently reimplemented wrong by a future contributor skimming too fast.

use std::fmt;

use crate::target::{Arch, TargetProcess};

/// Addresses below this are never valid to dereference or land on.
pub const MIN_VALID_ADDRESS: u64 = 0x10000;

/// What went wrong at a single step of a pointer-chain walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkErrorKind {
    /// The current address was below [`MIN_VALID_ADDRESS`].
    InvalidAddress,
    /// Reading the pointer at the current address failed or was short.
    PtrReadFailed,
    /// The pointer read was exactly zero.
    NullPointer,
    /// The pointer read was non-zero but still below [`MIN_VALID_ADDRESS`].
    InvalidPointerValue,
}

impl fmt::Display for WalkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InvalidAddress => "invalid address",
            Self::PtrReadFailed => "pointer read failed",
            Self::NullPointer => "null pointer",
            Self::InvalidPointerValue => "invalid pointer value",
        };
        f.write_str(text)
    }
}

/// A pointer-chain walk stopped before reaching the end of the offset list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkError {
    /// Zero-based index of the offset being applied when the walk failed.
    pub step: usize,
    /// The address the walk was standing on when it failed.
    pub address: u64,
    /// What specifically went wrong.
    pub kind: WalkErrorKind,
}

/// Resolve the pointer width to use for a walk.
///
/// `DTYPE` tokens take priority (`ptr32`/`ptr64`); absent that, the target's
/// known architecture decides (`X86` -> 4, `X64` -> 8); absent that too, a
/// heuristic on `base` decides (any bit above 32 set implies a 64-bit
/// pointer).
#[must_use]
pub fn resolve_ptr_size(dtype_tokens: &[&str], arch: Arch, base: u64) -> u8 {
    if dtype_tokens.iter().any(|t| *t == "ptr32") {
        return 4;
    }
    if dtype_tokens.iter().any(|t| *t == "ptr64") {
        return 8;
    }
    match arch {
        Arch::X86 => 4,
        Arch::X64 => 8,
        Arch::Unknown => {
            if base > u64::from(u32::MAX) {
                8
            } else {
                4
            }
        },
    }
}

/// Walk a pointer chain starting at `base`, applying `offsets` in order.
///
/// Returns the final address (the address the response's `DATA` is read
/// from), or a [`WalkError`] naming the step and address at which the walk
/// stopped.
///
/// # Errors
///
/// See [`WalkErrorKind`] for the conditions that abort a walk.
pub fn walk(
    target: &dyn TargetProcess,
    base: u64,
    offsets: &[i64],
    ptr_size: u8,
) -> Result<u64, WalkError> {
    let mut addr = base;

    for (step, offset) in offsets.iter().enumerate() {
        if addr < MIN_VALID_ADDRESS {
            tracing::debug!(step, address = addr, "pointer walk stopped: address below minimum");
            return Err(WalkError { step, address: addr, kind: WalkErrorKind::InvalidAddress });
        }

        let mut buf = [0u8; 8];
        let width = ptr_size as usize;
        let read = target.read(addr, &mut buf[..width]);
        let n = match read {
            Ok(n) => n,
            Err(_) => {
                tracing::debug!(step, address = addr, "pointer walk stopped: read failed");
                return Err(WalkError { step, address: addr, kind: WalkErrorKind::PtrReadFailed })
            },
        };
        if n != width {
            tracing::debug!(step, address = addr, n, width, "pointer walk stopped: short read");
            return Err(WalkError { step, address: addr, kind: WalkErrorKind::PtrReadFailed });
        }

        let ptr = if ptr_size == 4 {
            u64::from(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
        } else {
            u64::from_le_bytes(buf)
        };

        if ptr == 0 {
            tracing::debug!(step, address = addr, "pointer walk stopped: null pointer");
            return Err(WalkError { step, address: addr, kind: WalkErrorKind::NullPointer });
        }
        if ptr < MIN_VALID_ADDRESS {
            tracing::debug!(step, address = addr, ptr, "pointer walk stopped: invalid pointer value");
            return Err(WalkError {
                step,
                address: addr,
                kind: WalkErrorKind::InvalidPointerValue,
            });
        }

        addr = ptr.wrapping_add(*offset as u64);
    }

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use super::*;
    use crate::error::{CoreError, Result as CoreResult};

    struct FakeTarget {
        arch: Arch,
        memory: Mutex<HashMap<u64, Vec<u8>>>,
    }

    impl FakeTarget {
        fn new(arch: Arch) -> Self {
            Self { arch, memory: Mutex::new(HashMap::new()) }
        }

        fn seed(&self, address: u64, bytes: &[u8]) {
            self.memory.lock().unwrap().insert(address, bytes.to_vec());
        }
    }

    impl TargetProcess for FakeTarget {
        fn read(&self, address: u64, buf: &mut [u8]) -> CoreResult<usize> {
            let memory = self.memory.lock().unwrap();
            match memory.get(&address) {
                Some(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                },
                None => Err(CoreError::ReadFailed { address, len: buf.len() as u32 }),
            }
        }

        fn write(&self, address: u64, data: &[u8]) -> CoreResult<usize> {
            self.memory.lock().unwrap().insert(address, data.to_vec());
            Ok(data.len())
        }

        fn arch(&self) -> Arch {
            self.arch
        }
    }

    #[test]
    fn single_step_walk_dereferences_base() {
        let target = FakeTarget::new(Arch::X86);
        target.seed(0x0040_0100, &0x0050_0000u32.to_le_bytes());

        let addr = walk(&target, 0x0040_0100, &[0x10], 4).unwrap();
        assert_eq!(addr, 0x0050_0010);
    }

    #[test]
    fn empty_offsets_returns_base_unchanged() {
        let target = FakeTarget::new(Arch::X64);
        let addr = walk(&target, 0x0040_0100, &[], 8).unwrap();
        assert_eq!(addr, 0x0040_0100);
    }

    #[test]
    fn two_step_walk() {
        let target = FakeTarget::new(Arch::X64);
        target.seed(0x1000_0000, &0x2000_0000u64.to_le_bytes());
        target.seed(0x2000_0010, &0x3000_0000u64.to_le_bytes());

        let addr = walk(&target, 0x1000_0000, &[0x10, 0x20], 8).unwrap();
        assert_eq!(addr, 0x3000_0020);
    }

    #[test]
    fn base_below_min_fails_at_step_zero() {
        let target = FakeTarget::new(Arch::X86);
        let err = walk(&target, 0x100, &[0x10], 4).unwrap_err();
        assert_eq!(err, WalkError { step: 0, address: 0x100, kind: WalkErrorKind::InvalidAddress });
    }

    #[test]
    fn null_pointer_mid_walk_fails() {
        let target = FakeTarget::new(Arch::X86);
        target.seed(0x0040_0100, &0u32.to_le_bytes());
        let err = walk(&target, 0x0040_0100, &[0x10], 4).unwrap_err();
        assert_eq!(
            err,
            WalkError { step: 0, address: 0x0040_0100, kind: WalkErrorKind::NullPointer }
        );
    }

    #[test]
    fn unmapped_pointer_read_fails() {
        let target = FakeTarget::new(Arch::X86);
        let err = walk(&target, 0x0040_0100, &[0x10], 4).unwrap_err();
        assert_eq!(
            err,
            WalkError { step: 0, address: 0x0040_0100, kind: WalkErrorKind::PtrReadFailed }
        );
    }

    #[test]
    fn ptr_size_prefers_dtype_token() {
        assert_eq!(resolve_ptr_size(&["ptr32"], Arch::X64, 0), 4);
        assert_eq!(resolve_ptr_size(&["ptr64"], Arch::X86, 0), 8);
    }

    #[test]
    fn ptr_size_falls_back_to_arch() {
        assert_eq!(resolve_ptr_size(&["ce"], Arch::X86, 0), 4);
        assert_eq!(resolve_ptr_size(&["ce"], Arch::X64, 0), 8);
    }

    #[test]
    fn ptr_size_heuristic_on_unknown_arch() {
        assert_eq!(resolve_ptr_size(&[], Arch::Unknown, 0x0040_0000), 4);
        assert_eq!(resolve_ptr_size(&[], Arch::Unknown, 0x1_0000_0000), 8);
    }
}
