//! Raw deflate (no zlib/gzip header) used by mesh and material files

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::core::{Error, Result};

/// Inflate a raw deflate stream.
///
/// The stream must reach its final block; input that runs out early is
/// reported as truncated instead of yielding partial output.
pub fn inflate_raw(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(data.len().saturating_mul(4).max(64));

    loop {
        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out();
        if out.len() == out.capacity() {
            out.reserve(out.capacity());
        }

        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| Error::Decompression(format!("raw inflate failed: {}", e)))?;

        match status {
            Status::StreamEnd => return Ok(out),
            Status::Ok | Status::BufError => {
                let progressed =
                    inflater.total_in() as usize != consumed || inflater.total_out() != produced;
                if !progressed {
                    return Err(Error::Decompression(format!(
                        "raw deflate stream truncated after {} input bytes",
                        consumed
                    )));
                }
            }
        }
    }
}

/// Deflate into a raw stream, as the exporter writes it
pub fn deflate_raw(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Decompression(format!("raw deflate failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Decompression(format!("raw deflate finalization failed: {}", e)))
}
