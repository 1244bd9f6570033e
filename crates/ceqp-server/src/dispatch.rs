//! Request dispatcher.
//!
//! Each opcode is handled by a small function that extracts nothing itself
//! — [`crate::request::decode`] already did that — and calls straight into
//! `ceqp-core`. `READ_MOD_OFFSET`/`WRITE_MOD_OFFSET` resolve the module and
//! then fall through into the same flat read/write helper `READ_MEM`/
//! `WRITE_MEM` use, so there is exactly one code path per memory operation.

use ceqp_core::{
    memory::{self, read_exact_or_truncated, write_full, AccessPath},
    module::{self, ModuleEntry},
    pointer,
    target::{Arch, TargetProcess},
};
use ceqp_proto::{
    tlv::{self, Writer},
    Opcode,
};

/// Reserved error-response codes.
pub mod code {
    /// `GET_MOD_BASE` sent without `MODNAME`.
    pub const MODNAME_MISSING: u32 = 1;
    /// No loaded module matched the requested name.
    pub const MODULE_NOT_FOUND: u32 = 2;
    /// `READ_MEM` (or `READ_MOD_OFFSET`) sent without `ADDR`/`LEN`.
    pub const READ_MEM_MISSING: u32 = 3;
    /// A memory read failed.
    pub const READ_FAILED: u32 = 4;
    /// `WRITE_MEM` (or `WRITE_MOD_OFFSET`) sent without `ADDR`/`DATA`.
    pub const WRITE_MEM_MISSING: u32 = 5;
    /// A memory write failed.
    pub const WRITE_FAILED: u32 = 6;
    /// Pointer-chain arguments missing or malformed (bad `OFFSETS`).
    pub const PTR_CHAIN_ARGS: u32 = 13;
    /// The pointer walk itself failed partway through.
    pub const PTR_CHAIN_WALK_FAILED: u32 = 14;
    /// The walk succeeded but the final read failed.
    pub const PTR_CHAIN_FINAL_READ_FAILED: u32 = 15;
    /// The walk succeeded but the final write failed.
    pub const PTR_CHAIN_FINAL_WRITE_FAILED: u32 = 16;
    /// The frame's opcode was not one of the defined requests.
    pub const UNKNOWN_OPCODE: u32 = 100;
    /// The frame header's version byte was unsupported.
    pub const BAD_VERSION: u32 = 101;
    /// The frame header's `payload_len` exceeded the 1 MiB cap.
    pub const PAYLOAD_TOO_LARGE: u32 = 102;
}

/// A dispatch failure: one `ERROR_RESP` code plus a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    /// Reserved numeric error code.
    pub code: u32,
    /// Human-readable diagnostic, included verbatim in `ERRMSG`.
    pub message: String,
}

impl DispatchError {
    /// Build a dispatch error.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Encode this error as an `ERROR_RESP` payload (`ERRCODE` + `ERRMSG`).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        Writer::new().put_u32(tlv::tag::ERRCODE, self.code).put_str(tlv::tag::ERRMSG, &self.message).finish()
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A successful dispatch result: the response opcode byte and its payload.
pub struct DispatchOk {
    /// Response frame type byte.
    pub frame_type: u8,
    /// TLV-encoded response payload.
    pub payload: Vec<u8>,
}

/// Dispatch a decoded [`crate::request::Request`] against `target`/`modules`.
///
/// `test_env` controls whether pointer-chain reads echo back diagnostic
/// `DTYPE`/`LEN` tags, mirroring the `set_test_env` control-surface toggle.
///
/// # Errors
///
/// A [`DispatchError`] with the reserved code for whatever went wrong; the
/// caller (the server loop) turns this into exactly one `ERROR_RESP` frame.
pub fn dispatch(
    target: &dyn TargetProcess,
    modules: &[ModuleEntry],
    request: crate::request::Request,
    test_env: bool,
    cross_bitness_available: bool,
) -> Result<DispatchOk, DispatchError> {
    use crate::request::Request;

    let routed = select_target(target, Arch::host(), cross_bitness_available);
    let target: &dyn TargetProcess = routed.as_ref();

    match request {
        Request::Ping => Ok(DispatchOk { frame_type: Opcode::PingResp.to_u8(), payload: Vec::new() }),

        Request::ReadMem { addr, len } => {
            let data = flat_read(target, addr, len)?;
            Ok(DispatchOk {
                frame_type: Opcode::ReadMem.to_u8(),
                payload: Writer::new().put_bytes(tlv::tag::DATA, &data).finish(),
            })
        },

        Request::WriteMem { addr, data } => {
            flat_write(target, addr, &data)?;
            Ok(DispatchOk { frame_type: Opcode::WriteMem.to_u8(), payload: Vec::new() })
        },

        Request::ReadModOffset { modname, offset, len } => {
            let base = resolve_module(modules, &modname)?;
            let addr = base.wrapping_add(offset as u64);
            let data = flat_read(target, addr, len)?;
            Ok(DispatchOk {
                frame_type: Opcode::ReadModOffset.to_u8(),
                payload: Writer::new().put_bytes(tlv::tag::DATA, &data).finish(),
            })
        },

        Request::WriteModOffset { modname, offset, data } => {
            let base = resolve_module(modules, &modname)?;
            let addr = base.wrapping_add(offset as u64);
            flat_write(target, addr, &data)?;
            Ok(DispatchOk { frame_type: Opcode::WriteModOffset.to_u8(), payload: Vec::new() })
        },

        Request::ReadPtrChain { addr, offsets, len, dtype } => {
            let tokens = dtype_tokens(dtype.as_deref());
            let ptr_size = pointer::resolve_ptr_size(&tokens, target.arch(), addr);
            let final_len = len.unwrap_or(u32::from(ptr_size));

            let final_addr = pointer::walk(target, addr, &offsets, ptr_size).map_err(|e| {
                DispatchError::new(
                    code::PTR_CHAIN_WALK_FAILED,
                    format!("step {} at {:#x}: {}", e.step, e.address, e.kind),
                )
            })?;

            let data = read_exact_or_truncated(target, final_addr, final_len).map_err(|_| {
                DispatchError::new(
                    code::PTR_CHAIN_FINAL_READ_FAILED,
                    format!("final read failed at {final_addr:#x}"),
                )
            })?;

            let mut writer =
                Writer::new().put_bytes(tlv::tag::DATA, &data).put_u64(tlv::tag::ADDR, final_addr);
            if test_env {
                writer = writer.put_u32(tlv::tag::LEN, final_len);
                if let Some(dtype) = &dtype {
                    writer = writer.put_str(tlv::tag::DTYPE, dtype);
                }
            }

            Ok(DispatchOk { frame_type: Opcode::ReadPtrChain.to_u8(), payload: writer.finish() })
        },

        Request::WritePtrChain { addr, offsets, data, dtype } => {
            let tokens = dtype_tokens(dtype.as_deref());
            let ptr_size = pointer::resolve_ptr_size(&tokens, target.arch(), addr);

            let final_addr = pointer::walk(target, addr, &offsets, ptr_size).map_err(|e| {
                DispatchError::new(
                    code::PTR_CHAIN_WALK_FAILED,
                    format!("step {} at {:#x}: {}", e.step, e.address, e.kind),
                )
            })?;

            write_full(target, final_addr, &data).map_err(|_| {
                DispatchError::new(
                    code::PTR_CHAIN_FINAL_WRITE_FAILED,
                    format!("final write failed at {final_addr:#x}"),
                )
            })?;

            Ok(DispatchOk {
                frame_type: Opcode::WritePtrChain.to_u8(),
                payload: Writer::new().put_u64(tlv::tag::ADDR, final_addr).finish(),
            })
        },

        Request::GetModBase { modname } => {
            let base = resolve_module(modules, &modname)?;
            Ok(DispatchOk {
                frame_type: Opcode::GetModBase.to_u8(),
                payload: Writer::new().put_u64(tlv::tag::ADDR, base).finish(),
            })
        },
    }
}

/// Error response for an opcode byte that doesn't match any known request.
#[must_use]
pub fn unknown_opcode(raw: u8) -> DispatchError {
    DispatchError::new(code::UNKNOWN_OPCODE, format!("unknown opcode: {raw:#04x}"))
}

/// Route `target` through the access path its architecture requires,
/// relative to `server_arch` (per [`memory::select_path`]). Every memory
/// operation and pointer walk below goes through the returned wrapper, so
/// native-target address truncation and cross-bitness unavailability are
/// both enforced for real rather than left as dead, self-tested-only logic.
fn select_target<'a>(
    target: &'a dyn TargetProcess,
    server_arch: Arch,
    cross_bitness_available: bool,
) -> Box<dyn TargetProcess + 'a> {
    match memory::select_path(server_arch, target.arch()) {
        AccessPath::Native => Box::new(memory::NativeTarget::new(target)),
        AccessPath::CrossBitness if cross_bitness_available => {
            Box::new(memory::CrossBitnessTarget::available(target))
        },
        AccessPath::CrossBitness => {
            Box::new(memory::CrossBitnessTarget::<&dyn TargetProcess>::unavailable())
        },
    }
}

fn resolve_module(modules: &[ModuleEntry], name: &str) -> Result<u64, DispatchError> {
    module::resolve(modules, name)
        .map_err(|_| DispatchError::new(code::MODULE_NOT_FOUND, format!("module not found: {name}")))
}

fn flat_read(target: &dyn TargetProcess, addr: u64, len: u32) -> Result<Vec<u8>, DispatchError> {
    read_exact_or_truncated(target, addr, len)
        .map_err(|_| DispatchError::new(code::READ_FAILED, format!("read failed at {addr:#x}")))
}

fn flat_write(target: &dyn TargetProcess, addr: u64, data: &[u8]) -> Result<(), DispatchError> {
    write_full(target, addr, data)
        .map_err(|_| DispatchError::new(code::WRITE_FAILED, format!("write failed at {addr:#x}")))
}

fn dtype_tokens(dtype: Option<&str>) -> Vec<&str> {
    dtype.map(|s| s.split_whitespace().collect()).unwrap_or_default()
}
