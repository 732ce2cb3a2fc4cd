//! Material definition format (`*.mats`)
//!
//! Layout after raw inflate, all little-endian:
//!
//! ```text
//! int32   materialCount
//! repeat materialCount:
//!     u8+bytes  name
//!     u8+bytes  textureRef
//!     u8        transparent (non-zero = true)
//!     int32     frameCount           <= 0 = not animated
//!     int32     frameTimeMs          negative reads as 0
//!     int32     explicitFrameCount   0 = identity order
//!     int32     frames[explicitFrameCount]
//! ```

use std::collections::HashMap;

use crate::core::Result;
use crate::format::compression::{deflate_raw, inflate_raw};
use crate::format::reader::BinaryReader;
use crate::format::writer::BinaryWriter;

/// Texture animation: the texture is a vertical strip of `frame_count` frames
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialAnimation {
    pub frame_count: u32,
    pub frame_time_ms: u32,
    /// Strip frame played at each step; any non-zero length, every entry < `frame_count`
    pub frame_order: Vec<u32>,
}

/// A material as described by the exporter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterialDescriptor {
    pub name: String,
    /// Texture path, relative to the material base path unless absolute
    pub texture_ref: String,
    pub transparent: bool,
    pub animation: Option<MaterialAnimation>,
}

impl MaterialDescriptor {
    pub fn new(name: impl Into<String>, texture_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            texture_ref: texture_ref.into(),
            transparent: false,
            animation: None,
        }
    }

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }
}

/// Inflate and decode a compressed material file
pub fn decode_materials(compressed: &[u8]) -> Result<HashMap<String, MaterialDescriptor>> {
    let data = inflate_raw(compressed)?;
    parse_materials(&data)
}

/// Decode an already-inflated material file.
///
/// A later entry with a name seen before replaces the earlier one.
pub fn parse_materials(data: &[u8]) -> Result<HashMap<String, MaterialDescriptor>> {
    let mut reader = BinaryReader::new(data);
    let count = reader.read_count("material")?;
    let mut materials = HashMap::with_capacity(count.min(reader.remaining() / 15));

    for _ in 0..count {
        let descriptor = read_descriptor(&mut reader)?;
        materials.insert(descriptor.name.clone(), descriptor);
    }

    Ok(materials)
}

fn read_descriptor(reader: &mut BinaryReader<'_>) -> Result<MaterialDescriptor> {
    let name = reader.read_string()?;
    let texture_ref = reader.read_string()?;
    let transparent = reader.read_u8()? != 0;

    let frame_count = reader.read_i32()?;
    let frame_time_ms = reader.read_i32()?.max(0) as u32;
    let explicit_count = reader.read_count("explicit frame")?;

    let mut explicit = Vec::with_capacity(explicit_count.min(reader.remaining() / 4));
    for _ in 0..explicit_count {
        explicit.push(reader.read_i32()?);
    }

    let animation = if frame_count <= 0 {
        None
    } else if let Some(bad) = explicit.iter().find(|&&f| f < 0 || f >= frame_count) {
        log::warn!(
            "Material '{}': frame index {} out of range for {} frames, not animating",
            name, bad, frame_count
        );
        None
    } else {
        // An explicit order may be longer or shorter than the strip
        let frame_order: Vec<u32> = if explicit.is_empty() {
            (0..frame_count as u32).collect()
        } else {
            explicit.iter().map(|&f| f as u32).collect()
        };
        Some(MaterialAnimation {
            frame_count: frame_count as u32,
            frame_time_ms,
            frame_order,
        })
    };

    Ok(MaterialDescriptor {
        name,
        texture_ref,
        transparent,
        animation,
    })
}

/// Encode descriptors in the exporter's layout (uncompressed)
pub fn write_materials(descriptors: &[MaterialDescriptor]) -> Result<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    writer.write_count(descriptors.len())?;
    for descriptor in descriptors {
        writer.write_string(&descriptor.name)?;
        writer.write_string(&descriptor.texture_ref)?;
        writer.write_u8(descriptor.transparent as u8);
        match &descriptor.animation {
            Some(animation) => {
                writer.write_count(animation.frame_count as usize)?;
                writer.write_count(animation.frame_time_ms as usize)?;
                writer.write_count(animation.frame_order.len())?;
                for &frame in &animation.frame_order {
                    writer.write_count(frame as usize)?;
                }
            }
            None => {
                writer.write_i32(0);
                writer.write_i32(0);
                writer.write_i32(0);
            }
        }
    }
    Ok(writer.into_inner())
}

/// Encode and raw-deflate descriptors, producing a `*.mats` file body
pub fn encode_materials(descriptors: &[MaterialDescriptor]) -> Result<Vec<u8>> {
    deflate_raw(&write_materials(descriptors)?)
}
