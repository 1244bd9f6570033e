//! Decoded request sum type.
//!
//! One variant per opcode, carrying only the fields that opcode needs.
//! Missing-field detection lives entirely in [`Request::decode`] — handlers
//! in [`crate::dispatch`] never re-check for a tag's presence.

use bytes::Bytes;
use ceqp_proto::{tlv, Opcode};

use crate::dispatch::{code, DispatchError};

/// A fully-decoded, type-checked request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `PING 0x01` — no fields.
    Ping,
    /// `READ_MEM 0x10`.
    ReadMem {
        /// Absolute address to read from.
        addr: u64,
        /// Number of bytes to read.
        len: u32,
    },
    /// `WRITE_MEM 0x11`.
    WriteMem {
        /// Absolute address to write to.
        addr: u64,
        /// Bytes to write.
        data: Vec<u8>,
    },
    /// `READ_MOD_OFFSET 0x12`.
    ReadModOffset {
        /// Module file name to resolve.
        modname: String,
        /// Signed offset from the module base.
        offset: i64,
        /// Number of bytes to read.
        len: u32,
    },
    /// `WRITE_MOD_OFFSET 0x13`.
    WriteModOffset {
        /// Module file name to resolve.
        modname: String,
        /// Signed offset from the module base.
        offset: i64,
        /// Bytes to write.
        data: Vec<u8>,
    },
    /// `READ_PTR_CHAIN 0x14`.
    ReadPtrChain {
        /// Base address the walk starts from.
        addr: u64,
        /// Offsets applied at each step.
        offsets: Vec<i64>,
        /// Bytes to read at the walked address. Defaults to the pointer
        /// width when absent.
        len: Option<u32>,
        /// Raw `DTYPE` hint string, space-separated tokens.
        dtype: Option<String>,
    },
    /// `WRITE_PTR_CHAIN 0x15`.
    WritePtrChain {
        /// Base address the walk starts from.
        addr: u64,
        /// Offsets applied at each step.
        offsets: Vec<i64>,
        /// Bytes to write at the walked address.
        data: Vec<u8>,
        /// Raw `DTYPE` hint string, space-separated tokens.
        dtype: Option<String>,
    },
    /// `GET_MOD_BASE 0x20`.
    GetModBase {
        /// Module file name to resolve.
        modname: String,
    },
}

/// Decode `payload` into a [`Request`] for the given `opcode`.
///
/// # Errors
///
/// A [`DispatchError`] carrying the reserved error code for a missing or
/// malformed field for this opcode.
pub fn decode(opcode: Opcode, payload: &Bytes) -> Result<Request, DispatchError> {
    let records = tlv::decode(payload);

    match opcode {
        Opcode::Ping => Ok(Request::Ping),

        Opcode::ReadMem => {
            let addr = require_u64(&records, tlv::tag::ADDR, "ADDR", code::READ_MEM_MISSING)?;
            let len = require_u32(&records, tlv::tag::LEN, "LEN", code::READ_MEM_MISSING)?;
            Ok(Request::ReadMem { addr, len })
        },

        Opcode::WriteMem => {
            let addr = require_u64(&records, tlv::tag::ADDR, "ADDR", code::WRITE_MEM_MISSING)?;
            let data = require_bytes(&records, tlv::tag::DATA, "DATA", code::WRITE_MEM_MISSING)?;
            Ok(Request::WriteMem { addr, data })
        },

        Opcode::ReadModOffset => {
            let modname = require_string(
                &records,
                tlv::tag::MODNAME,
                "MODNAME",
                code::READ_MEM_MISSING,
            )?;
            let offset =
                require_i64(&records, tlv::tag::OFFSET, "OFFSET", code::READ_MEM_MISSING)?;
            let len = require_u32(&records, tlv::tag::LEN, "LEN", code::READ_MEM_MISSING)?;
            Ok(Request::ReadModOffset { modname, offset, len })
        },

        Opcode::WriteModOffset => {
            let modname = require_string(
                &records,
                tlv::tag::MODNAME,
                "MODNAME",
                code::WRITE_MEM_MISSING,
            )?;
            let offset =
                require_i64(&records, tlv::tag::OFFSET, "OFFSET", code::WRITE_MEM_MISSING)?;
            let data = require_bytes(&records, tlv::tag::DATA, "DATA", code::WRITE_MEM_MISSING)?;
            Ok(Request::WriteModOffset { modname, offset, data })
        },

        Opcode::ReadPtrChain => {
            let addr = require_u64(&records, tlv::tag::ADDR, "ADDR", code::PTR_CHAIN_ARGS)?;
            let offsets = tlv::require_offsets(&records, tlv::tag::OFFSETS)
                .map_err(|e| DispatchError::new(code::PTR_CHAIN_ARGS, e.to_string()))?;
            let len = tlv::optional_u32(&records, tlv::tag::LEN, "LEN")
                .map_err(|e| DispatchError::new(code::PTR_CHAIN_ARGS, e.to_string()))?;
            let dtype = tlv::optional_string(&records, tlv::tag::DTYPE, "DTYPE")
                .map_err(|e| DispatchError::new(code::PTR_CHAIN_ARGS, e.to_string()))?;
            Ok(Request::ReadPtrChain { addr, offsets, len, dtype })
        },

        Opcode::WritePtrChain => {
            let addr = require_u64(&records, tlv::tag::ADDR, "ADDR", code::PTR_CHAIN_ARGS)?;
            let offsets = tlv::require_offsets(&records, tlv::tag::OFFSETS)
                .map_err(|e| DispatchError::new(code::PTR_CHAIN_ARGS, e.to_string()))?;
            let data =
                require_bytes(&records, tlv::tag::DATA, "DATA", code::PTR_CHAIN_ARGS)?;
            let dtype = tlv::optional_string(&records, tlv::tag::DTYPE, "DTYPE")
                .map_err(|e| DispatchError::new(code::PTR_CHAIN_ARGS, e.to_string()))?;
            Ok(Request::WritePtrChain { addr, offsets, data, dtype })
        },

        Opcode::GetModBase => {
            let modname =
                require_string(&records, tlv::tag::MODNAME, "MODNAME", code::MODNAME_MISSING)?;
            Ok(Request::GetModBase { modname })
        },

        // Response-only opcodes (`PING_RESP`, `ERROR_RESP`) arriving as a
        // request are not one of the eight defined request types.
        Opcode::PingResp | Opcode::ErrorResp => Err(crate::dispatch::unknown_opcode(opcode.to_u8())),
    }
}

fn require_u64(
    records: &[tlv::Record],
    tag: u16,
    name: &'static str,
    error_code: u32,
) -> Result<u64, DispatchError> {
    tlv::require_u64(records, tag, name).map_err(|e| DispatchError::new(error_code, e.to_string()))
}

fn require_u32(
    records: &[tlv::Record],
    tag: u16,
    name: &'static str,
    error_code: u32,
) -> Result<u32, DispatchError> {
    tlv::require_u32(records, tag, name).map_err(|e| DispatchError::new(error_code, e.to_string()))
}

fn require_i64(
    records: &[tlv::Record],
    tag: u16,
    name: &'static str,
    error_code: u32,
) -> Result<i64, DispatchError> {
    tlv::require_i64(records, tag, name).map_err(|e| DispatchError::new(error_code, e.to_string()))
}

fn require_string(
    records: &[tlv::Record],
    tag: u16,
    name: &'static str,
    error_code: u32,
) -> Result<String, DispatchError> {
    tlv::require_string(records, tag, name)
        .map_err(|e| DispatchError::new(error_code, e.to_string()))
}

fn require_bytes(
    records: &[tlv::Record],
    tag: u16,
    name: &'static str,
    error_code: u32,
) -> Result<Vec<u8>, DispatchError> {
    tlv::require_bytes(records, tag, name)
        .map(|b| b.to_vec())
        .map_err(|e| DispatchError::new(error_code, e.to_string()))
}

#[cfg(test)]
mod tests {
    use ceqp_proto::tlv::Writer;

    use super::*;

    #[test]
    fn decodes_read_mem() {
        let payload =
            Writer::new().put_u64(tlv::tag::ADDR, 0x1000).put_u32(tlv::tag::LEN, 8).finish();
        let request = decode(Opcode::ReadMem, &Bytes::from(payload)).unwrap();
        assert_eq!(request, Request::ReadMem { addr: 0x1000, len: 8 });
    }

    #[test]
    fn missing_field_reports_reserved_code() {
        let payload = Writer::new().put_u64(tlv::tag::ADDR, 0x1000).finish();
        let err = decode(Opcode::ReadMem, &Bytes::from(payload)).unwrap_err();
        assert_eq!(err.code, code::READ_MEM_MISSING);
    }

    #[test]
    fn decodes_read_ptr_chain_with_optional_fields_absent() {
        let payload = Writer::new()
            .put_u64(tlv::tag::ADDR, 0x400100)
            .put_offsets(tlv::tag::OFFSETS, &[0x10])
            .finish();
        let request = decode(Opcode::ReadPtrChain, &Bytes::from(payload)).unwrap();
        assert_eq!(
            request,
            Request::ReadPtrChain { addr: 0x400100, offsets: vec![0x10], len: None, dtype: None }
        );
    }

    #[test]
    fn malformed_offsets_reports_ptr_chain_code() {
        let payload = Writer::new()
            .put_u64(tlv::tag::ADDR, 0x400100)
            .put_bytes(tlv::tag::OFFSETS, &[1, 2, 3])
            .finish();
        let err = decode(Opcode::ReadPtrChain, &Bytes::from(payload)).unwrap_err();
        assert_eq!(err.code, code::PTR_CHAIN_ARGS);
    }

    #[test]
    fn response_only_opcodes_are_rejected_as_requests() {
        let payload = Bytes::new();
        let err = decode(Opcode::PingResp, &payload).unwrap_err();
        assert_eq!(err.code, code::UNKNOWN_OPCODE);

        let err = decode(Opcode::ErrorResp, &payload).unwrap_err();
        assert_eq!(err.code, code::UNKNOWN_OPCODE);
    }

    #[test]
    fn decodes_get_mod_base() {
        let payload = Writer::new().put_str(tlv::tag::MODNAME, "kernel32.dll").finish();
        let request = decode(Opcode::GetModBase, &Bytes::from(payload)).unwrap();
        assert_eq!(request, Request::GetModBase { modname: "kernel32.dll".to_string() });
    }
}
