//! In-process demonstration target.
//!
//! `DemoTarget` stands in for a host-supplied process handle: a flat byte
//! array plus a synthetic module table. It exists only for the
//! demonstration binary and integration tests — plays the role the
//! teacher's `MemoryStorage` plays for room/frame persistence, an
//! in-memory stand-in for a resource that is normally external.

use std::sync::{Arc, Mutex};

use ceqp_core::{
    target::{Arch, HostModules, TargetProcess},
    CoreError, ModuleEntry, Result,
};

/// A `Vec<u8>`-backed process with a handful of preloaded modules.
///
/// Address `0` is reserved (never valid per `MIN_VALID_ADDRESS`); the
/// backing buffer is addressed starting at [`DemoTarget::BASE`] so that
/// realistic pointer-chain addresses (well above the null-pointer guard
/// band) can be used in demos and tests without the caller doing the
/// arithmetic.
#[derive(Clone)]
pub struct DemoTarget {
    inner: Arc<Mutex<Vec<u8>>>,
    modules: Vec<ModuleEntry>,
    arch: Arch,
}

impl DemoTarget {
    /// Base address the backing buffer is mapped at.
    pub const BASE: u64 = 0x0040_0000;

    /// Create a demo target with `size` bytes of zeroed memory and a
    /// synthetic two-module table (`game.exe`, `engine.dll`).
    #[must_use]
    pub fn new(size: usize, arch: Arch) -> Self {
        let modules = vec![
            ModuleEntry::new("game.exe", Self::BASE),
            #[allow(clippy::cast_possible_truncation)]
            ModuleEntry::new("engine.dll", Self::BASE + size as u64 / 2),
        ];
        Self { inner: Arc::new(Mutex::new(vec![0u8; size])), modules, arch }
    }

    fn offset_of(&self, address: u64) -> Option<usize> {
        address.checked_sub(Self::BASE).and_then(|off| usize::try_from(off).ok())
    }

    /// Number of bytes currently backing this target.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a thread panicked while
    /// holding the lock).
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("demo target mutex poisoned").len()
    }

    /// Whether the backing buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed the backing buffer at `address` with `bytes`, growing the
    /// buffer if needed. For constructing demo scenarios and test fixtures.
    ///
    /// # Panics
    ///
    /// Panics if `address` is below [`DemoTarget::BASE`], or if the
    /// internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn seed(&self, address: u64, bytes: &[u8]) {
        let offset = self.offset_of(address).expect("seed address below DemoTarget::BASE");
        let mut guard = self.inner.lock().expect("demo target mutex poisoned");
        let end = offset + bytes.len();
        if guard.len() < end {
            guard.resize(end, 0);
        }
        guard[offset..end].copy_from_slice(bytes);
    }
}

impl TargetProcess for DemoTarget {
    #[allow(clippy::expect_used)]
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<usize> {
        let offset = self.offset_of(address).ok_or(CoreError::ReadFailed {
            address,
            len: buf.len() as u32,
        })?;
        let guard = self.inner.lock().expect("demo target mutex poisoned");

        if offset >= guard.len() {
            return Err(CoreError::ReadFailed { address, len: buf.len() as u32 });
        }

        let end = (offset + buf.len()).min(guard.len());
        let n = end - offset;
        buf[..n].copy_from_slice(&guard[offset..end]);
        Ok(n)
    }

    #[allow(clippy::expect_used)]
    fn write(&self, address: u64, data: &[u8]) -> Result<usize> {
        let offset = self.offset_of(address).ok_or(CoreError::WriteFailed {
            address,
            written: 0,
            requested: data.len(),
        })?;
        let mut guard = self.inner.lock().expect("demo target mutex poisoned");

        let end = offset + data.len();
        if guard.len() < end {
            guard.resize(end, 0);
        }
        guard[offset..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn arch(&self) -> Arch {
        self.arch
    }
}

impl HostModules for DemoTarget {
    fn modules(&self) -> Vec<ModuleEntry> {
        self.modules.clone()
    }
}
