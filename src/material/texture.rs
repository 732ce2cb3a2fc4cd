//! Texture reference resolution and decoding

use crate::core::{Error, Result};

/// Resolve a texture ref against the material base path.
///
/// Absolute `http://` / `https://` refs pass through unchanged; an empty ref
/// stays empty.
pub fn resolve_texture_url(base: &str, texture_ref: &str) -> String {
    if texture_ref.is_empty() {
        return String::new();
    }
    if is_absolute_url(texture_ref) {
        return texture_ref.to_string();
    }
    format!("{}{}", base, texture_ref)
}

/// True for refs starting with `http://` or `https://` (any case)
pub fn is_absolute_url(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Decoded RGBA8 texture
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    /// Height of one frame when the image is a vertical strip of `frame_count` frames
    pub fn frame_height(&self, frame_count: u32) -> u32 {
        if frame_count == 0 {
            self.height
        } else {
            self.height / frame_count
        }
    }
}

/// Where a material's texture is in its fetch/decode lifecycle
#[derive(Clone, Debug, Default)]
pub enum TextureState {
    /// Material has no texture ref
    #[default]
    None,
    /// Fetch issued, bytes not yet arrived
    Pending,
    Ready(TextureImage),
    /// Fetch or decode failed; the material renders untextured
    Failed(String),
}

impl TextureState {
    pub fn is_ready(&self) -> bool {
        matches!(self, TextureState::Ready(_))
    }

    pub fn image(&self) -> Option<&TextureImage> {
        match self {
            TextureState::Ready(image) => Some(image),
            _ => None,
        }
    }
}

/// Decode an encoded image (PNG) into RGBA8
pub fn decode_texture(bytes: &[u8]) -> Result<TextureImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| Error::Texture(format!("failed to decode texture: {}", e)))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(TextureImage {
        width,
        height,
        rgba: image.into_raw(),
    })
}
