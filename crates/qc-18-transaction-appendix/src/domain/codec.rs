//! # Binary Codec Primitives
//!
//! Little-endian cursor types used by every appendix encoder/decoder.
//!
//! ## Length Field Bit-Packing
//!
//! Message-like payloads prefix their data with a 4-byte length whose high
//! bit carries the `is_text` flag:
//!
//! ```text
//!  31  30                                0
//! ┌───┬───────────────────────────────────┐
//! │ T │            byte length            │
//! └───┴───────────────────────────────────┘
//! ```
//!
//! Peers depend on this exact layout.

use super::errors::{AppendixError, AppendixResult};

/// High bit of a length field, set for text payloads.
pub const TEXT_FLAG: u32 = 0x8000_0000;

/// Mask recovering the byte length from a packed length field.
pub const LENGTH_MASK: u32 = 0x7FFF_FFFF;

/// Pack a payload length and text flag into a length field.
pub fn pack_length(length: usize, is_text: bool) -> u32 {
    let length = length as u32 & LENGTH_MASK;
    if is_text {
        length | TEXT_FLAG
    } else {
        length
    }
}

/// Split a length field into `(length, is_text)`.
pub fn unpack_length(field: u32) -> (usize, bool) {
    ((field & LENGTH_MASK) as usize, field & TEXT_FLAG != 0)
}

/// Read cursor over an appendix region.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn get_bytes(&mut self, count: usize) -> AppendixResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(AppendixError::Truncated {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn get_array<const N: usize>(&mut self) -> AppendixResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.get_bytes(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> AppendixResult<u8> {
        Ok(self.get_array::<1>()?[0])
    }

    pub fn get_u32(&mut self) -> AppendixResult<u32> {
        Ok(u32::from_le_bytes(self.get_array()?))
    }

    pub fn get_u64(&mut self) -> AppendixResult<u64> {
        Ok(u64::from_le_bytes(self.get_array()?))
    }

    /// Read a packed length field, rejecting lengths above `max`.
    pub fn get_length(&mut self, field: &'static str, max: usize) -> AppendixResult<(usize, bool)> {
        let (length, is_text) = unpack_length(self.get_u32()?);
        if length > max {
            return Err(AppendixError::LengthExceeded { field, length, max });
        }
        Ok((length, is_text))
    }
}

/// Append-only write buffer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_flag_packing() {
        assert_eq!(pack_length(12, true), 12 | 0x8000_0000);
        assert_eq!(pack_length(12, false), 12);
        assert_eq!(unpack_length(12 | 0x8000_0000), (12, true));
        assert_eq!(unpack_length(12), (12, false));
    }

    #[test]
    fn test_reader_is_little_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0xFF];
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.get_u32().unwrap(), 0x0403_0201);
        assert_eq!(reader.get_u8().unwrap(), 0xFF);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_truncated() {
        let data = [0u8; 3];
        let mut reader = ByteReader::new(&data);
        let err = reader.get_u32().unwrap_err();
        assert_eq!(
            err,
            AppendixError::Truncated {
                needed: 4,
                remaining: 3
            }
        );
        // Failed read does not advance
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_length_limit_checked_after_masking() {
        let mut writer = ByteWriter::default();
        writer.put_u32(1001 | TEXT_FLAG);
        let bytes = writer.into_inner();

        let mut reader = ByteReader::new(&bytes);
        let err = reader.get_length("message", 1000).unwrap_err();
        assert!(matches!(err, AppendixError::LengthExceeded { length: 1001, .. }));
    }
}
