//! Little-endian writer producing the exporter's binary layout

use crate::core::{Error, Result};

/// Append-only counterpart of [`BinaryReader`](super::reader::BinaryReader).
#[derive(Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write an element count as `int32`
    pub fn write_count(&mut self, count: usize) -> Result<()> {
        let count = i32::try_from(count)
            .map_err(|_| Error::malformed(format!("count {} does not fit in int32", count)))?;
        self.write_i32(count);
        Ok(())
    }

    /// Write a string with a one-byte length prefix. Strings over 255 bytes are rejected.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u8::try_from(value.len()).map_err(|_| {
            Error::malformed(format!("string of {} bytes exceeds the 255-byte limit", value.len()))
        })?;
        self.write_u8(len);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::reader::BinaryReader;

    #[test]
    fn test_writer_layout() {
        let mut writer = BinaryWriter::new();
        writer.write_i32(-2);
        writer.write_string("ab").unwrap();
        assert_eq!(writer.into_inner(), vec![0xFE, 0xFF, 0xFF, 0xFF, 2, b'a', b'b']);
    }

    #[test]
    fn test_writer_rejects_long_string() {
        let mut writer = BinaryWriter::new();
        let long = "x".repeat(256);
        assert!(writer.write_string(&long).is_err());
        assert!(writer.is_empty());

        let max = "y".repeat(255);
        writer.write_string(&max).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(BinaryReader::new(&bytes).read_string().unwrap(), max);
    }
}
