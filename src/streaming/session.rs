//! One streamed world: manifest, materials, chunk registry and fetch queue
//!
//! All state is owned by the session and mutated only from `stream_tick`,
//! `animation_tick` and `settle`, on the thread that owns the session.
//! Dropping the session drops both registries.

use std::sync::Arc;

use glam::{IVec2, Vec3};

use crate::core::{Error, Result, StreamingConfig};
use crate::format::material::decode_materials;
use crate::format::mesh::{MeshBuffer, decode_mesh};
use crate::material::{MaterialCache, MaterialId};
use crate::streaming::display::{DisplaySink, ErrorSink, LogErrorSink, LoggingDisplay};
use crate::streaming::fetch::{ByteSource, FetchQueue, FetchResult};
use crate::streaming::registry::{
    ChunkFetcher, ChunkRegistry, ChunkTicket, LifecycleState, LoadOutcome,
};
use crate::streaming::streamer::{ChunkStreamer, TickReport};
use crate::streaming::view::{ViewId, ViewSet};
use crate::world::manifest::{MANIFEST_FILE, WorldInfo};

/// What an in-flight fetch is for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchTag {
    Chunk(ChunkTicket),
    Texture(MaterialId),
}

/// Observer state supplied once per tick by the camera owner
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Observer {
    /// Distance from the camera to its target
    pub distance: f64,
    /// Target position in world coordinates
    pub target: Vec3,
}

impl Observer {
    pub fn new(distance: f64, target: Vec3) -> Self {
        Self { distance, target }
    }
}

/// Snapshot of session counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub active_view: Option<ViewId>,
    pub loading: usize,
    pub loaded: usize,
    /// Evicted while in flight, awaiting their discarded completion
    pub orphaned: usize,
    pub materials: usize,
    pub animated_materials: usize,
    pub fetches_in_flight: usize,
}

/// `path` as a directory prefix: empty, or ending in `/`
fn dir_prefix(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Routes registry fetches into the session queue
struct QueueFetcher<'a> {
    queue: &'a mut FetchQueue<FetchTag>,
    world_prefix: &'a str,
    /// Requests the queue refused; failed back into the registry after the walk
    refused: Vec<(ChunkTicket, Error)>,
}

impl ChunkFetcher for QueueFetcher<'_> {
    fn request(&mut self, ticket: ChunkTicket, path: String) {
        let full = format!("{}{}", self.world_prefix, path);
        if let Err(e) = self.queue.request(FetchTag::Chunk(ticket), full) {
            self.refused.push((ticket, e));
        }
    }
}

/// Streaming state for exactly one world
pub struct WorldSession<D = LoggingDisplay, E = LogErrorSink> {
    config: StreamingConfig,
    info: WorldInfo,
    world_prefix: String,
    registry: ChunkRegistry,
    materials: MaterialCache,
    streamer: ChunkStreamer,
    queue: FetchQueue<FetchTag>,
    display: D,
    errors: E,
    active_view: Option<ViewId>,
}

impl<D: DisplaySink, E: ErrorSink> WorldSession<D, E> {
    /// Load the manifest and material files of the world at `world_path`.
    ///
    /// A missing or invalid manifest is fatal. Material files that fail to
    /// load are reported and skipped; their materials fall back to
    /// placeholders. Must be called within a tokio runtime.
    pub async fn open(
        world_path: &str,
        config: StreamingConfig,
        source: Arc<dyn ByteSource>,
        display: D,
        mut errors: E,
    ) -> Result<Self> {
        config.validate()?;
        let world_prefix = dir_prefix(world_path);

        let manifest = source.fetch(&format!("{}{}", world_prefix, MANIFEST_FILE)).await?;
        let info = WorldInfo::parse(&manifest)?;
        let views = info.view_set()?;

        let material_prefix = if config.material_path.is_empty() {
            world_prefix.clone()
        } else {
            dir_prefix(&config.material_path)
        };
        let mut materials = MaterialCache::new(material_prefix.clone());

        let mut keys = config.material_keys.clone();
        for key in &info.materials {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        for key in &keys {
            let path = format!("{}{}.mats", material_prefix, key);
            let loaded = match source.fetch(&path).await {
                Ok(bytes) => decode_materials(&bytes),
                Err(e) => Err(e),
            };
            match loaded {
                Ok(descriptors) => materials.add_descriptors(descriptors),
                Err(e) => errors.report(&e),
            }
        }

        log::info!(
            "Opened world '{}': {} views, {} material descriptors",
            world_path,
            views.len(),
            materials.descriptor_count()
        );

        Ok(Self {
            registry: ChunkRegistry::new(views, config.chunk_world_size),
            streamer: ChunkStreamer::new(&config),
            queue: FetchQueue::new_with_current_runtime(source, config.max_concurrent_fetches),
            config,
            info,
            world_prefix,
            materials,
            display,
            errors,
            active_view: None,
        })
    }

    /// Apply completed fetches, select the view and schedule loads.
    ///
    /// Returns a default report (no view) when the observer is closer than
    /// every view threshold.
    pub fn stream_tick(&mut self, observer: Observer) -> TickReport {
        for result in self.queue.poll_results() {
            self.apply(result);
        }
        self.flush_texture_requests();

        let Some(view) = self.registry.views().select_view(observer.distance) else {
            return TickReport::default();
        };
        if self.active_view != Some(view) {
            if let Some(v) = self.registry.views().get(view) {
                log::info!("Active view '{}' (span {})", v.filename_prefix, v.chunk_span);
            }
            self.active_view = Some(view);
        }

        let size = self.config.chunk_world_size;
        let observer_chunk = IVec2::new(
            (observer.target.x / size).floor() as i32,
            (observer.target.z / size).floor() as i32,
        );

        let mut fetcher = QueueFetcher {
            queue: &mut self.queue,
            world_prefix: &self.world_prefix,
            refused: Vec::new(),
        };
        let report = self
            .streamer
            .stream_tick(&mut self.registry, view, observer_chunk, &mut fetcher, &mut self.display);

        for (ticket, error) in fetcher.refused {
            if let Err(e) = self.registry.complete_load(ticket, Err(error), &mut self.display) {
                self.errors.report(&e);
            }
        }
        report
    }

    /// Advance animated materials one frame; returns how many advanced
    pub fn animation_tick(&mut self) -> usize {
        self.materials.tick_animations()
    }

    /// Wait until every in-flight fetch has completed and been applied,
    /// including texture fetches scheduled along the way.
    pub async fn settle(&mut self) {
        while let Some(result) = self.queue.next_result().await {
            self.apply(result);
            self.flush_texture_requests();
        }
    }

    fn apply(&mut self, FetchResult { tag, path, result }: FetchResult<FetchTag>) {
        match tag {
            FetchTag::Chunk(ticket) => {
                // Decoding an orphan would realize its materials for nothing
                let mesh = if self.registry.state(ticket) == Some(LifecycleState::Loading) {
                    result.and_then(|bytes| decode_mesh(&bytes, &mut self.materials))
                } else {
                    Ok(MeshBuffer::default())
                };
                match self.registry.complete_load(ticket, mesh, &mut self.display) {
                    Ok(LoadOutcome::Displayed { superseded }) => {
                        log::debug!("Loaded {} (superseded {})", path, superseded);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        log::debug!("Chunk {} failed", path);
                        self.errors.report(&e);
                    }
                }
            }
            FetchTag::Texture(id) => {
                if let Err(e) = self.materials.complete_texture(id, result) {
                    self.errors.report(&e);
                }
            }
        }
    }

    fn flush_texture_requests(&mut self) {
        for (id, url) in self.materials.take_texture_requests() {
            let queued = self.queue.request(FetchTag::Texture(id), url);
            if let Err(e) = queued.or_else(|e| self.materials.complete_texture(id, Err(e))) {
                self.errors.report(&e);
            }
        }
    }

    /// Initial observer target from the manifest, if any
    pub fn home(&self) -> Option<Vec3> {
        self.info.home_position()
    }

    pub fn info(&self) -> &WorldInfo {
        &self.info
    }

    pub fn views(&self) -> &ViewSet {
        self.registry.views()
    }

    pub fn registry(&self) -> &ChunkRegistry {
        &self.registry
    }

    pub fn materials(&self) -> &MaterialCache {
        &self.materials
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn errors(&self) -> &E {
        &self.errors
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            active_view: self.active_view,
            loading: self.registry.count(LifecycleState::Loading),
            loaded: self.registry.count(LifecycleState::Loaded),
            orphaned: self.registry.count(LifecycleState::Unloaded),
            materials: self.materials.len(),
            animated_materials: self.materials.animated_count(),
            fetches_in_flight: self.queue.in_flight(),
        }
    }

    /// Remove every displayed chunk and hand back the sinks
    pub fn close(mut self) -> (D, E) {
        self.registry.clear(&mut self.display);
        log::info!("Closed world ({} fetches abandoned)", self.queue.in_flight());
        (self.display, self.errors)
    }
}
