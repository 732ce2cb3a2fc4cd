//! Binary codecs for the exporter's mesh and material files

pub mod reader;
pub mod writer;
pub mod compression;
pub mod mesh;
pub mod material;

pub use reader::BinaryReader;
pub use writer::BinaryWriter;
pub use compression::{inflate_raw, deflate_raw};
pub use mesh::{
    MeshBuffer, MeshVertex, MaterialGroup, MaterialResolver, VERTEX_STRIDE,
    decode_mesh, parse_mesh, encode_mesh, write_mesh,
};
pub use material::{
    MaterialAnimation, MaterialDescriptor,
    decode_materials, parse_materials, encode_materials, write_materials,
};
