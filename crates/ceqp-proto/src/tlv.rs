//! TLV (type-length-value) payload codec.
//!
//! A record is `<tag: u16 LE><len: u16 LE><bytes>`. Records are concatenated
//! in arbitrary order inside a frame payload; duplicate tags resolve to the
//! first occurrence. The decoder is tolerant at the scan level — a record
//! whose declared length would run past the remaining payload simply
//! terminates the scan rather than erroring, per the wire spec — but the
//! typed extraction helpers below are strict: a field present with the
//! wrong byte width is a decode failure, not a silent truncation.

use bytes::Bytes;

use crate::{
    byte,
    error::{ProtocolError, Result},
};

/// Recognized TLV tags.
pub mod tag {
    /// 64-bit address or base.
    pub const ADDR: u16 = 0x0001;
    /// 32-bit length.
    pub const LEN: u16 = 0x0002;
    /// UTF-8 module name, no NUL terminator.
    pub const MODNAME: u16 = 0x0003;
    /// 64-bit signed offset.
    pub const OFFSET: u16 = 0x0004;
    /// Packed array of 64-bit signed offsets.
    pub const OFFSETS: u16 = 0x0005;
    /// Opaque data bytes.
    pub const DATA: u16 = 0x0006;
    /// UTF-8 space-separated dtype hint tokens.
    pub const DTYPE: u16 = 0x0007;
    /// 32-bit error code.
    pub const ERRCODE: u16 = 0x00FE;
    /// UTF-8 error message.
    pub const ERRMSG: u16 = 0x00FF;
}

/// A single decoded TLV record: its tag and a zero-copy slice of its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The 16-bit tag.
    pub tag: u16,
    /// The value bytes (exactly `len` bytes, per the record's own length
    /// field).
    pub value: Bytes,
}

/// Decode every well-formed record in `payload`.
///
/// Scanning stops (without error) at the first record whose declared
/// length would exceed the remaining bytes; no partial record is ever
/// returned. This matches the CEQP wire spec's "tolerant extraction" rule:
/// malformed trailing bytes are simply invisible to callers rather than
/// fatal.
#[must_use]
pub fn decode(payload: &Bytes) -> Vec<Record> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos + 4 <= payload.len() {
        let tag = byte::read_u16(&payload[pos..]);
        let len = byte::read_u16(&payload[pos + 2..]) as usize;
        let value_start = pos + 4;
        let value_end = value_start + len;

        if value_end > payload.len() {
            break;
        }

        records.push(Record { tag, value: payload.slice(value_start..value_end) });
        pos = value_end;
    }

    records
}

/// First record matching `tag`, if any.
#[must_use]
pub fn find(records: &[Record], tag: u16) -> Option<&Record> {
    records.iter().find(|r| r.tag == tag)
}

/// Extract the raw bytes of a required field.
pub fn require_bytes(records: &[Record], tag: u16, name: &'static str) -> Result<Bytes> {
    find(records, tag).map(|r| r.value.clone()).ok_or(ProtocolError::MissingField(name))
}

/// Extract the raw bytes of an optional field.
#[must_use]
pub fn optional_bytes(records: &[Record], tag: u16) -> Option<Bytes> {
    find(records, tag).map(|r| r.value.clone())
}

/// Extract a required `u64` field (exactly 8 bytes).
pub fn require_u64(records: &[Record], tag: u16, name: &'static str) -> Result<u64> {
    let bytes = require_bytes(records, tag, name)?;
    if bytes.len() != 8 {
        return Err(ProtocolError::WrongFieldWidth { name, expected: 8, actual: bytes.len() });
    }
    Ok(byte::read_u64(&bytes))
}

/// Extract an optional `u64` field (exactly 8 bytes if present).
pub fn optional_u64(records: &[Record], tag: u16, name: &'static str) -> Result<Option<u64>> {
    match optional_bytes(records, tag) {
        None => Ok(None),
        Some(bytes) if bytes.len() == 8 => Ok(Some(byte::read_u64(&bytes))),
        Some(bytes) => {
            Err(ProtocolError::WrongFieldWidth { name, expected: 8, actual: bytes.len() })
        },
    }
}

/// Extract a required `u32` field (exactly 4 bytes).
pub fn require_u32(records: &[Record], tag: u16, name: &'static str) -> Result<u32> {
    let bytes = require_bytes(records, tag, name)?;
    if bytes.len() != 4 {
        return Err(ProtocolError::WrongFieldWidth { name, expected: 4, actual: bytes.len() });
    }
    Ok(byte::read_u32(&bytes))
}

/// Extract an optional `u32` field (exactly 4 bytes if present).
pub fn optional_u32(records: &[Record], tag: u16, name: &'static str) -> Result<Option<u32>> {
    match optional_bytes(records, tag) {
        None => Ok(None),
        Some(bytes) if bytes.len() == 4 => Ok(Some(byte::read_u32(&bytes))),
        Some(bytes) => {
            Err(ProtocolError::WrongFieldWidth { name, expected: 4, actual: bytes.len() })
        },
    }
}

/// Extract a required `i64` field (exactly 8 bytes).
pub fn require_i64(records: &[Record], tag: u16, name: &'static str) -> Result<i64> {
    let bytes = require_bytes(records, tag, name)?;
    if bytes.len() != 8 {
        return Err(ProtocolError::WrongFieldWidth { name, expected: 8, actual: bytes.len() });
    }
    Ok(byte::read_i64(&bytes))
}

/// Extract a required UTF-8 string field.
pub fn require_string(records: &[Record], tag: u16, name: &'static str) -> Result<String> {
    let bytes = require_bytes(records, tag, name)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8(name))
}

/// Extract an optional UTF-8 string field.
pub fn optional_string(records: &[Record], tag: u16, name: &'static str) -> Result<Option<String>> {
    match optional_bytes(records, tag) {
        None => Ok(None),
        Some(bytes) => {
            String::from_utf8(bytes.to_vec()).map(Some).map_err(|_| ProtocolError::InvalidUtf8(name))
        },
    }
}

/// Extract a required `OFFSETS` field: a packed array of LE `i64`s.
///
/// Length must be a multiple of 8; an empty array (zero offsets) is valid.
pub fn require_offsets(records: &[Record], tag: u16) -> Result<Vec<i64>> {
    let bytes = require_bytes(records, tag, "OFFSETS")?;
    if bytes.len() % 8 != 0 {
        return Err(ProtocolError::MalformedOffsets(bytes.len()));
    }
    Ok(bytes.chunks_exact(8).map(byte::read_i64).collect())
}

/// Incremental builder for a TLV-encoded payload.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Start a new, empty payload builder.
    #[must_use]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn put_header(&mut self, tag: u16, len: u16) {
        byte::write_u16(&mut self.buf, tag);
        byte::write_u16(&mut self.buf, len);
    }

    /// Append a raw bytes field.
    #[must_use]
    pub fn put_bytes(mut self, tag: u16, value: &[u8]) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let len = value.len() as u16;
        self.put_header(tag, len);
        self.buf.extend_from_slice(value);
        self
    }

    /// Append a `u64` field.
    #[must_use]
    pub fn put_u64(mut self, tag: u16, value: u64) -> Self {
        self.put_header(tag, 8);
        byte::write_u64(&mut self.buf, value);
        self
    }

    /// Append a `u32` field.
    #[must_use]
    pub fn put_u32(mut self, tag: u16, value: u32) -> Self {
        self.put_header(tag, 4);
        byte::write_u32(&mut self.buf, value);
        self
    }

    /// Append an `i64` field.
    #[must_use]
    pub fn put_i64(mut self, tag: u16, value: i64) -> Self {
        self.put_header(tag, 8);
        byte::write_i64(&mut self.buf, value);
        self
    }

    /// Append a UTF-8 string field.
    #[must_use]
    pub fn put_str(self, tag: u16, value: &str) -> Self {
        self.put_bytes(tag, value.as_bytes())
    }

    /// Append an `OFFSETS`-shaped packed `i64` array field.
    #[must_use]
    pub fn put_offsets(mut self, tag: u16, values: &[i64]) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let len = (values.len() * 8) as u16;
        self.put_header(tag, len);
        for v in values {
            byte::write_i64(&mut self.buf, *v);
        }
        self
    }

    /// Consume the builder, producing the encoded payload bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_u64() {
        let payload = Writer::new().put_u64(tag::ADDR, 0x1234_5678_9abc_def0).finish();
        let records = decode(&Bytes::from(payload));
        assert_eq!(require_u64(&records, tag::ADDR, "ADDR").unwrap(), 0x1234_5678_9abc_def0);
    }

    #[test]
    fn round_trip_string() {
        let payload = Writer::new().put_str(tag::MODNAME, "kernel32.dll").finish();
        let records = decode(&Bytes::from(payload));
        assert_eq!(require_string(&records, tag::MODNAME, "MODNAME").unwrap(), "kernel32.dll");
    }

    #[test]
    fn duplicate_tags_resolve_to_first() {
        let mut w = Writer::new();
        w = w.put_u64(tag::ADDR, 111);
        w = w.put_u64(tag::ADDR, 222);
        let records = decode(&Bytes::from(w.finish()));
        assert_eq!(require_u64(&records, tag::ADDR, "ADDR").unwrap(), 111);
    }

    #[test]
    fn truncated_record_stops_scan_without_error() {
        // A well-formed record followed by a header claiming more bytes than exist.
        let mut buf = Writer::new().put_u32(tag::LEN, 8).finish();
        buf.extend_from_slice(&tag::DATA.to_le_bytes());
        buf.extend_from_slice(&100u16.to_le_bytes());
        buf.extend_from_slice(&[1, 2, 3]); // only 3 of the claimed 100 bytes

        let records = decode(&Bytes::from(buf));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag, tag::LEN);
    }

    #[test]
    fn wrong_width_fails_extraction() {
        let payload = Writer::new().put_bytes(tag::ADDR, &[1, 2, 3]).finish();
        let records = decode(&Bytes::from(payload));
        let err = require_u64(&records, tag::ADDR, "ADDR").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::WrongFieldWidth { name: "ADDR", expected: 8, actual: 3 }
        );
    }

    #[test]
    fn missing_field_fails() {
        let records = decode(&Bytes::from(Vec::new()));
        assert_eq!(
            require_u64(&records, tag::ADDR, "ADDR").unwrap_err(),
            ProtocolError::MissingField("ADDR")
        );
    }

    #[test]
    fn offsets_round_trip_and_validates_length() {
        let payload = Writer::new().put_offsets(tag::OFFSETS, &[16, -32, 0]).finish();
        let records = decode(&Bytes::from(payload));
        assert_eq!(require_offsets(&records, tag::OFFSETS).unwrap(), vec![16, -32, 0]);

        let bad = Writer::new().put_bytes(tag::OFFSETS, &[1, 2, 3]).finish();
        let records = decode(&Bytes::from(bad));
        assert_eq!(require_offsets(&records, tag::OFFSETS).unwrap_err(), ProtocolError::MalformedOffsets(3));
    }

    #[test]
    fn empty_offsets_is_valid() {
        let payload = Writer::new().put_offsets(tag::OFFSETS, &[]).finish();
        let records = decode(&Bytes::from(payload));
        assert_eq!(require_offsets(&records, tag::OFFSETS).unwrap(), Vec::<i64>::new());
    }
}
