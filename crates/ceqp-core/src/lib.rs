//! Cross-architecture memory access, module resolution, and pointer-chain
//! walking for the Cheat Engine Query Protocol engine.
//!
//! This crate knows nothing about the wire format (`ceqp-proto`) or frame
//! dispatch (`ceqp-server`); it only answers "what's at this address",
//! "where is this module", and "where does this pointer chain end up".

pub mod env;
pub mod error;
pub mod memory;
pub mod module;
pub mod pointer;
pub mod target;

pub use error::{CoreError, Result};
pub use module::ModuleEntry;
pub use pointer::{WalkError, WalkErrorKind};
pub use target::{Arch, HostModules, TargetProcess};
