//! Chunk mesh format (`*.m`)
//!
//! Layout after raw inflate, all little-endian:
//!
//! ```text
//! int32   vertexCount
//! f32     vertices[vertexCount * 11]   position(3) uv(2) normal(3) color(3)
//! int32   indexCount
//! uint32  indices[indexCount]
//! int32   groupCount
//! repeat groupCount:
//!     uint32  runLength
//!     u8      nameLength
//!     u8      name[nameLength]         UTF-8
//! ```
//!
//! Groups are stored in draw order; their run lengths tile the index buffer.

use bytemuck::{Pod, Zeroable};

use crate::core::{Error, Result};
use crate::format::compression::{deflate_raw, inflate_raw};
use crate::format::reader::BinaryReader;
use crate::format::writer::BinaryWriter;
use crate::material::MaterialId;

/// Number of `f32` values per interleaved vertex
pub const VERTEX_STRIDE: usize = 11;

/// One interleaved vertex, laid out exactly as stored on disk
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    /// Stored as floats; consumers treat it as a normalized direction
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

/// A run of indices drawn with one material
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialGroup {
    /// Index into [`MeshBuffer::materials`]
    pub material_index: u32,
    /// Offset of the first index of this run
    pub start: u32,
    /// Number of indices in this run
    pub count: u32,
}

/// Decoded chunk geometry
#[derive(Clone, Debug, Default)]
pub struct MeshBuffer {
    pub vertices: Vec<MeshVertex>,
    /// Triangle list
    pub indices: Vec<u32>,
    /// Draw-ordered groups; their counts sum to `indices.len()`
    pub groups: Vec<MaterialGroup>,
    /// Per-mesh material table, deduplicated by name
    pub materials: Vec<MaterialId>,
}

impl MeshBuffer {
    /// The interleaved vertex buffer as flat floats (stride [`VERTEX_STRIDE`])
    pub fn vertex_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// The vertex buffer as raw bytes, ready for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Approximate heap footprint of the geometry
    pub fn byte_size(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<MeshVertex>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }
}

/// Maps a material name to a material id.
///
/// Called at most once per distinct name within one decode.
pub trait MaterialResolver {
    fn resolve(&mut self, name: &str) -> MaterialId;
}

impl<F: FnMut(&str) -> MaterialId> MaterialResolver for F {
    fn resolve(&mut self, name: &str) -> MaterialId {
        self(name)
    }
}

/// Inflate and decode a compressed mesh buffer
pub fn decode_mesh(compressed: &[u8], resolver: &mut dyn MaterialResolver) -> Result<MeshBuffer> {
    let data = inflate_raw(compressed)?;
    parse_mesh(&data, resolver)
}

/// Decode an already-inflated mesh buffer
pub fn parse_mesh(data: &[u8], resolver: &mut dyn MaterialResolver) -> Result<MeshBuffer> {
    let mut reader = BinaryReader::new(data);

    let vertex_count = reader.read_count("vertex")?;
    let float_count = vertex_count
        .checked_mul(VERTEX_STRIDE)
        .ok_or_else(|| Error::malformed(format!("vertex count {} overflows", vertex_count)))?;
    let floats = reader.read_f32_vec(float_count)?;
    let vertices: Vec<MeshVertex> = bytemuck::cast_slice(&floats).to_vec();

    let index_count = reader.read_count("index")?;
    if index_count % 3 != 0 {
        return Err(Error::malformed(format!(
            "index count {} is not a whole number of triangles",
            index_count
        )));
    }
    let indices = reader.read_u32_vec(index_count)?;
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(Error::malformed(format!(
            "index {} out of range for {} vertices",
            bad, vertex_count
        )));
    }

    // Names are read and checked before any material is resolved, so a
    // corrupt buffer never creates materials.
    let group_count = reader.read_count("material group")?;
    let mut runs = Vec::with_capacity(group_count.min(reader.remaining() / 5));
    let mut total: u64 = 0;
    for _ in 0..group_count {
        let run_length = reader.read_u32()?;
        let name = reader.read_string()?;
        total += run_length as u64;
        runs.push((run_length, name));
    }
    if total != index_count as u64 {
        return Err(Error::malformed(format!(
            "material groups cover {} indices, buffer has {}",
            total, index_count
        )));
    }

    let mut names: Vec<String> = Vec::new();
    let mut materials = Vec::new();
    let mut groups = Vec::with_capacity(runs.len());
    let mut start = 0u32;
    for (count, name) in runs {
        let material_index = match names.iter().position(|n| *n == name) {
            Some(index) => index,
            None => {
                materials.push(resolver.resolve(&name));
                names.push(name);
                names.len() - 1
            }
        };
        groups.push(MaterialGroup {
            material_index: material_index as u32,
            start,
            count,
        });
        start += count;
    }

    Ok(MeshBuffer {
        vertices,
        indices,
        groups,
        materials,
    })
}

/// Encode geometry in the exporter's layout (uncompressed).
///
/// `groups` pairs each index run with its material name, in draw order.
pub fn write_mesh(
    vertices: &[MeshVertex],
    indices: &[u32],
    groups: &[(u32, &str)],
) -> Result<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    writer.write_count(vertices.len())?;
    for value in bytemuck::cast_slice::<MeshVertex, f32>(vertices) {
        writer.write_f32(*value);
    }
    writer.write_count(indices.len())?;
    for &index in indices {
        writer.write_u32(index);
    }
    writer.write_count(groups.len())?;
    for &(run_length, name) in groups {
        writer.write_u32(run_length);
        writer.write_string(name)?;
    }
    Ok(writer.into_inner())
}

/// Encode and raw-deflate geometry, producing a `*.m` file body
pub fn encode_mesh(
    vertices: &[MeshVertex],
    indices: &[u32],
    groups: &[(u32, &str)],
) -> Result<Vec<u8>> {
    deflate_raw(&write_mesh(vertices, indices, groups)?)
}
