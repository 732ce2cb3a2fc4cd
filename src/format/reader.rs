//! Little-endian cursor over a decompressed buffer

use crate::core::{Error, Result};

/// Forward-only reader over a byte slice.
///
/// Every read is bounds-checked; running past the end yields
/// [`Error::MalformedData`] and leaves the cursor where it was.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current cursor offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::malformed(format!(
                "read of {} bytes at offset {} exceeds buffer of {} bytes",
                len,
                self.pos,
                self.data.len()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Read an element count stored as `int32`. Negative counts are malformed.
    pub fn read_count(&mut self, what: &str) -> Result<usize> {
        let count = self.read_i32()?;
        usize::try_from(count)
            .map_err(|_| Error::malformed(format!("negative {} count: {}", what, count)))
    }

    /// Read `count` consecutive little-endian `f32` values.
    ///
    /// The whole run is bounds-checked before anything is decoded.
    pub fn read_f32_vec(&mut self, count: usize) -> Result<Vec<f32>> {
        let bytes = self.read_bytes(byte_len(count, 4)?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Read `count` consecutive little-endian `u32` values
    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        let bytes = self.read_bytes(byte_len(count, 4)?)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    /// Read a string with a one-byte length prefix (UTF-8 payload).
    ///
    /// The prefix caps strings at 255 bytes; that limit is part of the format.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let len = self.read_u8()? as usize;
        let bytes = match self.read_bytes(len) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.pos = start;
                return Err(e);
            }
        };
        match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_owned()),
            Err(e) => {
                self.pos = start;
                Err(Error::malformed(format!("invalid UTF-8 string at offset {}: {}", start, e)))
            }
        }
    }
}

fn byte_len(count: usize, elem_size: usize) -> Result<usize> {
    count
        .checked_mul(elem_size)
        .ok_or_else(|| Error::malformed(format!("element count {} overflows", count)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives_little_endian() {
        let data = [
            0x01, 0x00, 0x00, 0x00, // i32 1
            0xFF, 0xFF, 0xFF, 0xFF, // u32 max
            0x2A, // u8 42
            0x00, 0x00, 0x80, 0x3F, // f32 1.0
        ];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_i32().unwrap(), 1);
        assert_eq!(reader.read_u32().unwrap(), u32::MAX);
        assert_eq!(reader.read_u8().unwrap(), 42);
        assert_eq!(reader.read_f32().unwrap(), 1.0);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_read_past_end_fails_without_advancing() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data);
        assert!(matches!(reader.read_i32(), Err(Error::MalformedData(_))));
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u8().unwrap(), 1);
    }

    #[test]
    fn test_read_string() {
        let data = [3, b'a', b'b', b'c', 0];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_string().unwrap(), "abc");
        assert_eq!(reader.read_string().unwrap(), "");
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_read_string_length_exceeds_buffer() {
        let data = [10, b'a', b'b'];
        let mut reader = BinaryReader::new(&data);
        assert!(matches!(reader.read_string(), Err(Error::MalformedData(_))));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_read_string_invalid_utf8() {
        let data = [2, 0xC3, 0x28];
        let mut reader = BinaryReader::new(&data);
        assert!(reader.read_string().is_err());
    }

    #[test]
    fn test_read_negative_count() {
        let data = (-5i32).to_le_bytes();
        let mut reader = BinaryReader::new(&data);
        assert!(matches!(reader.read_count("vertex"), Err(Error::MalformedData(_))));
    }

    #[test]
    fn test_read_vec_bounds_checked_up_front() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.extend_from_slice(&2.5f32.to_le_bytes());
        let mut reader = BinaryReader::new(&data);
        assert!(reader.read_f32_vec(3).is_err());
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_f32_vec(2).unwrap(), vec![1.5, 2.5]);
    }

    #[test]
    fn test_read_huge_count_overflow() {
        let mut reader = BinaryReader::new(&[]);
        assert!(reader.read_u32_vec(usize::MAX).is_err());
    }
}
