//! Module enumeration and name resolution.

use crate::error::{CoreError, Result};

/// One loaded module in a target process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    /// File name of the module, e.g. `kernel32.dll`. No path components.
    pub name: String,
    /// Load base address.
    pub base: u64,
}

impl ModuleEntry {
    /// Build a module entry.
    #[must_use]
    pub fn new(name: impl Into<String>, base: u64) -> Self {
        Self { name: name.into(), base }
    }
}

/// Resolve `name` against `modules` using ASCII case-insensitive whole-string
/// comparison of the file name (no path matching). First match wins.
///
/// # Errors
///
/// [`CoreError::ModuleNotFound`] if nothing matches.
pub fn resolve(modules: &[ModuleEntry], name: &str) -> Result<u64> {
    modules
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(name))
        .map(|m| m.base)
        .ok_or_else(|| CoreError::ModuleNotFound(name.to_string()))
}
