//! Mapview - streaming core for tiled, multi-resolution voxel-world exports

pub mod core;
pub mod format;
pub mod material;
pub mod streaming;
pub mod world;
