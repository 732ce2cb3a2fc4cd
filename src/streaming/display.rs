//! Seams to the external renderer and error reporting

use std::collections::HashMap;

use glam::Vec3;

use crate::core::Error;
use crate::format::mesh::MeshBuffer;
use crate::streaming::registry::ChunkKey;

/// Renderer-side handle for a displayed chunk mesh
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayHandle(pub u64);

/// The scene graph the streamer feeds.
///
/// `add_displayable` takes ownership of the geometry; the registry keeps only
/// the returned handle so it can remove the mesh later.
pub trait DisplaySink {
    fn add_displayable(&mut self, key: ChunkKey, mesh: MeshBuffer, position: Vec3) -> DisplayHandle;
    fn remove_displayable(&mut self, handle: DisplayHandle);
}

/// Receives per-chunk and per-material failures. Never fatal.
pub trait ErrorSink {
    fn report(&mut self, error: &Error);
}

/// Error sink writing to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&mut self, error: &Error) {
        log::error!("{}", error);
    }
}

/// Collects error messages in order
impl ErrorSink for Vec<String> {
    fn report(&mut self, error: &Error) {
        self.push(error.to_string());
    }
}

/// Display sink that only logs and tracks meshes; used by the headless binary
#[derive(Debug, Default)]
pub struct LoggingDisplay {
    next_handle: u64,
    shown: HashMap<DisplayHandle, ChunkKey>,
    triangles: usize,
}

impl LoggingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Meshes currently displayed
    pub fn displayed(&self) -> usize {
        self.shown.len()
    }

    /// Keys of the displayed chunks, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &ChunkKey> {
        self.shown.values()
    }

    /// Triangles handed over since creation
    pub fn triangles(&self) -> usize {
        self.triangles
    }
}

impl DisplaySink for LoggingDisplay {
    fn add_displayable(
        &mut self,
        key: ChunkKey,
        mesh: MeshBuffer,
        position: Vec3,
    ) -> DisplayHandle {
        self.next_handle += 1;
        let handle = DisplayHandle(self.next_handle);
        self.shown.insert(handle, key);
        self.triangles += mesh.triangle_count();
        log::debug!(
            "Display {:?} at {:?}: {} triangles, {} materials",
            key,
            position,
            mesh.triangle_count(),
            mesh.materials.len()
        );
        handle
    }

    fn remove_displayable(&mut self, handle: DisplayHandle) {
        match self.shown.remove(&handle) {
            Some(key) => log::debug!("Remove {:?} ({:?})", key, handle),
            None => log::warn!("Remove of unknown {:?}", handle),
        }
    }
}
