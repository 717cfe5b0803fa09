//! Wire-level primitives for the recording format.
//!
//! The format is a restricted subset of protobuf encoding. There is no schema
//! compiler at runtime: every field is decoded by hand from its tag, where
//! `field = tag >> 3` and `wire_type = tag & 7`.
//!
//! Only four wire types exist in practice:
//! - `0` varint
//! - `1` fixed 64-bit
//! - `2` length-delimited
//! - `5` fixed 32-bit

use crate::error::{FlockError, Result};

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_FIXED64: u8 = 1;
pub const WIRE_LEN: u8 = 2;
pub const WIRE_FIXED32: u8 = 5;

/// A decoded field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub field: u64,
    pub wire_type: u8,
}

impl Tag {
    pub fn from_raw(raw: u64) -> Self {
        Self {
            field: raw >> 3,
            wire_type: (raw & 7) as u8,
        }
    }

    pub fn to_raw(self) -> u64 {
        (self.field << 3) | u64::from(self.wire_type & 7)
    }
}

/// Decodes a base-128 varint starting at `offset`.
///
/// Returns the value and the offset just past the last byte consumed.
pub fn read_varint(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    let mut pos = offset;
    loop {
        let byte = *buf
            .get(pos)
            .ok_or_else(|| FlockError::truncated(format!("varint at offset {}", offset)))?;
        pos += 1;
        value |= u64::from(byte & 0x7F) << shift;
        if byte < 0x80 {
            return Ok((value, pos));
        }
        shift += 7;
        if shift > 63 {
            return Err(FlockError::malformed(format!(
                "varint at offset {} exceeds 64 bits",
                offset
            )));
        }
    }
}

/// Skips the payload of a field whose tag has already been consumed.
pub fn skip_field(buf: &[u8], offset: usize, wire_type: u8) -> Result<usize> {
    let next = match wire_type {
        WIRE_VARINT => return read_varint(buf, offset).map(|(_, next)| next),
        WIRE_FIXED64 => offset + 8,
        WIRE_LEN => {
            let (len, after) = read_varint(buf, offset)?;
            after.saturating_add(usize::try_from(len).unwrap_or(usize::MAX))
        }
        WIRE_FIXED32 => offset + 4,
        other => return Err(FlockError::UnsupportedWireType(other)),
    };
    if next > buf.len() {
        return Err(FlockError::truncated(format!(
            "field payload at offset {} runs past end of buffer ({} bytes)",
            offset,
            buf.len()
        )));
    }
    Ok(next)
}

/// Cursor over an immutable byte buffer.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Reads the next tag, or `None` once the buffer is exhausted.
    pub fn next_tag(&mut self) -> Result<Option<Tag>> {
        if self.is_at_end() {
            return Ok(None);
        }
        let raw = self.read_varint()?;
        Ok(Some(Tag::from_raw(raw)))
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, next) = read_varint(self.buf, self.pos)?;
        self.pos = next;
        Ok(value)
    }

    /// Reads an IEEE-754 little-endian double.
    pub fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    /// Reads a length prefix and returns the delimited slice.
    pub fn read_len_delimited(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()?;
        let len = usize::try_from(len)
            .map_err(|_| FlockError::malformed(format!("length {} does not fit in memory", len)))?;
        self.take(len)
    }

    /// Reads a length-delimited UTF-8 string, replacing invalid sequences.
    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_len_delimited()?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn skip(&mut self, wire_type: u8) -> Result<()> {
        self.pos = skip_field(self.buf, self.pos, wire_type)?;
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                FlockError::truncated(format!(
                    "need {} bytes at offset {}, buffer has {}",
                    len,
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Decodes a packed run of varints filling the whole payload.
pub fn read_packed_varints(payload: &[u8]) -> Result<Vec<u64>> {
    let mut reader = WireReader::new(payload);
    let mut values = Vec::new();
    while !reader.is_at_end() {
        values.push(reader.read_varint()?);
    }
    Ok(values)
}

/// Appends the varint encoding of `value` to `out`.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Builder for messages in the same wire subset.
#[derive(Debug, Default, Clone)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(&mut self, field: u64, wire_type: u8) -> &mut Self {
        encode_varint(Tag { field, wire_type }.to_raw(), &mut self.buf);
        self
    }

    pub fn varint_field(&mut self, field: u64, value: u64) -> &mut Self {
        self.tag(field, WIRE_VARINT);
        encode_varint(value, &mut self.buf);
        self
    }

    pub fn f64_field(&mut self, field: u64, value: f64) -> &mut Self {
        self.tag(field, WIRE_FIXED64);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn f32_field(&mut self, field: u64, value: f32) -> &mut Self {
        self.tag(field, WIRE_FIXED32);
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn bytes_field(&mut self, field: u64, payload: &[u8]) -> &mut Self {
        self.tag(field, WIRE_LEN);
        encode_varint(payload.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(payload);
        self
    }

    pub fn string_field(&mut self, field: u64, value: &str) -> &mut Self {
        self.bytes_field(field, value.as_bytes())
    }

    pub fn packed_varints_field(&mut self, field: u64, values: &[u64]) -> &mut Self {
        let mut packed = Vec::with_capacity(values.len());
        for &v in values {
            encode_varint(v, &mut packed);
        }
        self.bytes_field(field, &packed)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
