//! Material realization, texture state and animation

pub mod cache;
pub mod texture;

pub use cache::{Material, MaterialCache, MaterialId, AnimationState, ALPHA_TEST};
pub use texture::{TextureImage, TextureState, resolve_texture_url, decode_texture};
