//! Session-wide material cache with animation ticking
//!
//! Descriptors from every loaded `.mats` file are kept by name; a [`Material`]
//! is only realized the first time a mesh references it. Animated materials
//! are registered with one shared ticker that [`MaterialCache::tick_animations`]
//! advances on a fixed period.

use std::collections::HashMap;

use crate::core::Result;
use crate::format::mesh::MaterialResolver;
use crate::format::material::{MaterialAnimation, MaterialDescriptor};
use crate::material::texture::{TextureState, decode_texture, resolve_texture_url};

/// Alpha cutoff applied to every realized material
pub const ALPHA_TEST: f32 = 0.5;

/// Stable handle to a realized material within one cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Playback state of an animated texture strip
#[derive(Clone, Debug)]
pub struct AnimationState {
    animation: MaterialAnimation,
    current_frame: usize,
}

impl AnimationState {
    fn new(animation: MaterialAnimation) -> Self {
        Self {
            animation,
            current_frame: 0,
        }
    }

    /// Step to the next entry of the frame order, wrapping at the end
    fn advance(&mut self) {
        self.current_frame += 1;
        if self.current_frame >= self.animation.frame_order.len() {
            self.current_frame = 0;
        }
    }

    pub fn animation(&self) -> &MaterialAnimation {
        &self.animation
    }

    /// Position in the frame order
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Frame of the strip currently shown
    pub fn current_strip_frame(&self) -> u32 {
        self.animation
            .frame_order
            .get(self.current_frame)
            .copied()
            .unwrap_or(0)
    }

    /// Vertical UV repeat selecting one frame of the strip
    pub fn texture_repeat_y(&self) -> f32 {
        1.0 / self.animation.frame_count as f32
    }

    /// Vertical UV offset of the current frame
    pub fn texture_offset_y(&self) -> f32 {
        -(self.current_strip_frame() as f32) / self.animation.frame_count as f32
    }
}

/// A realized material
#[derive(Debug)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    /// Resolved texture location; empty when the material has none
    pub texture_url: String,
    pub transparent: bool,
    /// Transparent materials are blended and do not write depth
    pub depth_write: bool,
    pub alpha_test: f32,
    pub texture: TextureState,
    pub animation: Option<AnimationState>,
}

impl Material {
    fn from_descriptor(id: MaterialId, descriptor: &MaterialDescriptor, base_path: &str) -> Self {
        Self {
            id,
            name: descriptor.name.clone(),
            texture_url: resolve_texture_url(base_path, &descriptor.texture_ref),
            transparent: descriptor.transparent,
            depth_write: !descriptor.transparent,
            alpha_test: ALPHA_TEST,
            texture: TextureState::None,
            animation: descriptor.animation.clone().map(AnimationState::new),
        }
    }

    fn placeholder(id: MaterialId, name: &str) -> Self {
        Self::from_descriptor(id, &MaterialDescriptor::new(name, ""), "")
    }

    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }
}

/// Name-keyed material cache for one world session
pub struct MaterialCache {
    /// Prefix for relative texture refs
    base_path: String,
    descriptors: HashMap<String, MaterialDescriptor>,
    materials: Vec<Material>,
    by_name: HashMap<String, MaterialId>,
    /// Materials driven by the animation ticker
    animated: Vec<MaterialId>,
    /// Texture fetches not yet handed to a byte source
    texture_requests: Vec<MaterialId>,
}

impl MaterialCache {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            descriptors: HashMap::new(),
            materials: Vec::new(),
            by_name: HashMap::new(),
            animated: Vec::new(),
            texture_requests: Vec::new(),
        }
    }

    /// Register descriptors from a decoded material file.
    ///
    /// Materials already realized keep their existing state.
    pub fn add_descriptors(&mut self, descriptors: HashMap<String, MaterialDescriptor>) {
        log::debug!("Registering {} material descriptors", descriptors.len());
        self.descriptors.extend(descriptors);
    }

    pub fn descriptor(&self, name: &str) -> Option<&MaterialDescriptor> {
        self.descriptors.get(name)
    }

    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Realize the material named `name`, or return the existing one.
    ///
    /// Names without a descriptor get an untextured placeholder so the mesh
    /// still draws.
    pub fn get_or_create(&mut self, name: &str) -> MaterialId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }

        let id = MaterialId(self.materials.len() as u32);
        let mut material = match self.descriptors.get(name) {
            Some(descriptor) => Material::from_descriptor(id, descriptor, &self.base_path),
            None => {
                log::warn!("No material descriptor for '{}', using placeholder", name);
                Material::placeholder(id, name)
            }
        };

        if material.is_animated() {
            self.animated.push(id);
        }
        if !material.texture_url.is_empty() {
            material.texture = TextureState::Pending;
            self.texture_requests.push(id);
        }

        log::debug!("Realized material '{}' as {:?}", name, id);
        self.by_name.insert(name.to_string(), id);
        self.materials.push(material);
        id
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    pub fn find(&self, name: &str) -> Option<&Material> {
        self.by_name.get(name).and_then(|&id| self.get(id))
    }

    /// Number of realized materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn animated_count(&self) -> usize {
        self.animated.len()
    }

    /// Advance every animated material by one frame.
    ///
    /// The period is the caller's; per-material `frame_time_ms` is not
    /// consulted. Returns the number of materials advanced.
    pub fn tick_animations(&mut self) -> usize {
        for &id in &self.animated {
            if let Some(state) = self.materials[id.0 as usize].animation.as_mut() {
                state.advance();
            }
        }
        self.animated.len()
    }

    /// Drain texture fetches queued since the last call, as `(id, url)` pairs
    pub fn take_texture_requests(&mut self) -> Vec<(MaterialId, String)> {
        std::mem::take(&mut self.texture_requests)
            .into_iter()
            .map(|id| (id, self.materials[id.0 as usize].texture_url.clone()))
            .collect()
    }

    /// Record the outcome of a texture fetch.
    ///
    /// Failures leave the material usable without a texture; the error is
    /// returned for the caller to report.
    pub fn complete_texture(&mut self, id: MaterialId, fetched: Result<Vec<u8>>) -> Result<()> {
        let Some(material) = self.materials.get_mut(id.0 as usize) else {
            return Ok(());
        };

        match fetched.and_then(|bytes| decode_texture(&bytes)) {
            Ok(image) => {
                log::debug!(
                    "Texture for '{}' ready ({}x{})",
                    material.name, image.width, image.height
                );
                material.texture = TextureState::Ready(image);
                Ok(())
            }
            Err(e) => {
                material.texture = TextureState::Failed(e.to_string());
                Err(e)
            }
        }
    }
}

impl MaterialResolver for MaterialCache {
    fn resolve(&mut self, name: &str) -> MaterialId {
        self.get_or_create(name)
    }
}
