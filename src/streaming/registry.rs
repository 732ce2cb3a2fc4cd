//! Authoritative set of loading and loaded chunks
//!
//! Lifecycle per `(view, x, z)` key:
//!
//! ```text
//! absent -> Loading -> Loaded -> evicted (absent)
//!              \
//!               -> Unloaded (evicted while in flight) -> discarded on completion
//! ```
//!
//! A chunk evicted while its fetch is still in flight leaves the key index
//! right away, so the cell can be requested again, but stays in the registry
//! as `Unloaded` until its completion arrives and is thrown away. There is no
//! request abort; the transfer still finishes.

use std::collections::HashMap;

use glam::Vec3;

use crate::core::Result;
use crate::format::mesh::MeshBuffer;
use crate::streaming::display::{DisplayHandle, DisplaySink};
use crate::streaming::view::{View, ViewId, ViewSet};

/// Identity of a chunk cell within one view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub view: ViewId,
    /// View-local cell coordinates (units of `chunk_span` source chunks)
    pub x: i32,
    pub z: i32,
}

impl ChunkKey {
    pub fn new(view: ViewId, x: i32, z: i32) -> Self {
        Self { view, x, z }
    }
}

/// Identifies one load attempt; completions are matched by ticket, not key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkTicket(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Fetch issued, result not yet applied
    Loading,
    /// Geometry handed to the display sink
    Loaded,
    /// Evicted while loading; the result will be discarded
    Unloaded,
}

/// One streamed tile
#[derive(Clone, Debug)]
pub struct Chunk {
    pub key: ChunkKey,
    pub ticket: ChunkTicket,
    pub state: LifecycleState,
    /// Back-reference to the displayed mesh, present once `Loaded`
    pub display: Option<DisplayHandle>,
}

/// Region file location of a view cell
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionPos {
    pub region_x: i32,
    pub region_z: i32,
    /// Non-negative position within the region
    pub local_x: i32,
    pub local_z: i32,
}

impl RegionPos {
    pub fn of(view: &View, x: i32, z: i32) -> Self {
        let cells = view.cells_per_region();
        Self {
            region_x: x.div_euclid(cells),
            region_z: z.div_euclid(cells),
            local_x: x.rem_euclid(cells),
            local_z: z.rem_euclid(cells),
        }
    }
}

/// Mesh file path of a view cell: `r.{rx}.{rz}/{prefix}.{lx}.{lz}.m`
pub fn chunk_path(view: &View, x: i32, z: i32) -> String {
    let pos = RegionPos::of(view, x, z);
    format!(
        "r.{}.{}/{}.{}.{}.m",
        pos.region_x, pos.region_z, view.filename_prefix, pos.local_x, pos.local_z
    )
}

/// Issues the asynchronous byte fetch for a newly registered chunk
pub trait ChunkFetcher {
    fn request(&mut self, ticket: ChunkTicket, path: String);
}

/// What happened to a completed load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Geometry displayed; `superseded` coarser chunks were evicted
    Displayed { superseded: usize },
    /// The chunk had been evicted while loading; nothing was displayed
    Discarded,
    /// No chunk holds this ticket (already finalized)
    Stale,
}

/// Registry of chunks for one world session
pub struct ChunkRegistry {
    views: ViewSet,
    /// World units per source chunk edge
    chunk_world_size: f32,
    chunks: HashMap<ChunkTicket, Chunk>,
    /// Live (not `Unloaded`) chunks by cell
    index: HashMap<ChunkKey, ChunkTicket>,
    next_ticket: u64,
}

impl ChunkRegistry {
    pub fn new(views: ViewSet, chunk_world_size: f32) -> Self {
        Self {
            views,
            chunk_world_size,
            chunks: HashMap::new(),
            index: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn views(&self) -> &ViewSet {
        &self.views
    }

    /// True if no chunk exists for the cell. In that case a `Loading` chunk
    /// is registered and its fetch issued through `fetcher` before returning,
    /// so a second call for the same cell returns false.
    pub fn needs_load(
        &mut self,
        view: ViewId,
        x: i32,
        z: i32,
        fetcher: &mut dyn ChunkFetcher,
    ) -> bool {
        let key = ChunkKey::new(view, x, z);
        if self.index.contains_key(&key) {
            return false;
        }
        let Some(view_def) = self.views.get(view) else {
            log::warn!("Load requested for unknown view {:?}", view);
            return false;
        };
        let path = chunk_path(view_def, x, z);

        let ticket = ChunkTicket(self.next_ticket);
        self.next_ticket += 1;
        self.chunks.insert(
            ticket,
            Chunk {
                key,
                ticket,
                state: LifecycleState::Loading,
                display: None,
            },
        );
        self.index.insert(key, ticket);

        log::debug!("Loading {:?} from {} ({:?})", key, path, ticket);
        fetcher.request(ticket, path);
        true
    }

    /// State of the chunk holding `ticket`
    pub fn state(&self, ticket: ChunkTicket) -> Option<LifecycleState> {
        self.chunks.get(&ticket).map(|c| c.state)
    }

    pub fn get(&self, key: ChunkKey) -> Option<&Chunk> {
        self.index.get(&key).and_then(|t| self.chunks.get(t))
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.index.contains_key(&key)
    }

    /// World-space origin of a view cell
    pub fn world_position(&self, key: ChunkKey) -> Vec3 {
        let span = self.views.get(key.view).map_or(1, |v| v.chunk_span) as f32;
        let cell = self.chunk_world_size * span;
        Vec3::new(key.x as f32 * cell, 0.0, key.z as f32 * cell)
    }

    /// Apply the result of a chunk fetch + decode.
    ///
    /// `Unloaded` chunks are finalized without touching the display. A failed
    /// load removes the chunk so a later spiral pass can retry it; the error
    /// is returned for reporting.
    pub fn complete_load(
        &mut self,
        ticket: ChunkTicket,
        result: Result<MeshBuffer>,
        display: &mut dyn DisplaySink,
    ) -> Result<LoadOutcome> {
        let Some(chunk) = self.chunks.get(&ticket) else {
            return Ok(LoadOutcome::Stale);
        };
        let key = chunk.key;

        match chunk.state {
            LifecycleState::Unloaded => {
                self.chunks.remove(&ticket);
                log::debug!("Discarded late result for {:?}", key);
                return Ok(LoadOutcome::Discarded);
            }
            LifecycleState::Loaded => {
                log::warn!("Duplicate completion for {:?}", key);
                return Ok(LoadOutcome::Stale);
            }
            LifecycleState::Loading => {}
        }

        let mesh = match result {
            Ok(mesh) => mesh,
            Err(e) => {
                self.chunks.remove(&ticket);
                self.index.remove(&key);
                return Err(e);
            }
        };

        let position = self.world_position(key);
        let handle = display.add_displayable(key, mesh, position);
        if let Some(chunk) = self.chunks.get_mut(&ticket) {
            chunk.state = LifecycleState::Loaded;
            chunk.display = Some(handle);
        }

        let superseded = self.supersede(key, display);
        Ok(LoadOutcome::Displayed { superseded })
    }

    /// Evict every chunk of other views, and every chunk of `view` outside
    /// `center ± unload_distance / 2` on either axis. Returns the eviction count.
    pub fn evict_out_of_range(
        &mut self,
        view: ViewId,
        center_x: i32,
        center_z: i32,
        unload_distance: u32,
        display: &mut dyn DisplaySink,
    ) -> usize {
        let limit = unload_distance as i64;
        let outside = |c: i32, center: i32| {
            let doubled = 2 * (c as i64 - center as i64);
            doubled < -limit || doubled > limit
        };

        let doomed: Vec<ChunkTicket> = self
            .index
            .iter()
            .filter(|(key, _)| {
                key.view != view || outside(key.x, center_x) || outside(key.z, center_z)
            })
            .map(|(_, &ticket)| ticket)
            .collect();

        for &ticket in &doomed {
            self.evict(ticket, display);
        }
        if !doomed.is_empty() {
            log::debug!("Evicted {} chunks around ({}, {})", doomed.len(), center_x, center_z);
        }
        doomed.len()
    }

    /// Evict coarser chunks covering the ground of the finer chunk `key`.
    ///
    /// A view is coarser when its distance threshold is larger; the covering
    /// cell is found by rescaling the coordinate by the ratio of chunk spans.
    fn supersede(&mut self, key: ChunkKey, display: &mut dyn DisplaySink) -> usize {
        let Some(fine) = self.views.get(key.view) else {
            return 0;
        };
        let fine_x = key.x as i64 * fine.chunk_span as i64;
        let fine_z = key.z as i64 * fine.chunk_span as i64;

        let covering: Vec<ChunkKey> = self
            .views
            .iter()
            .filter(|(id, v)| *id != key.view && v.distance_threshold > fine.distance_threshold)
            .map(|(id, v)| {
                let span = v.chunk_span as i64;
                ChunkKey::new(id, fine_x.div_euclid(span) as i32, fine_z.div_euclid(span) as i32)
            })
            .collect();

        let mut evicted = 0;
        for coarse in covering {
            if let Some(&ticket) = self.index.get(&coarse) {
                log::debug!("{:?} superseded by {:?}", coarse, key);
                self.evict(ticket, display);
                evicted += 1;
            }
        }
        evicted
    }

    /// Evict one chunk: remove a displayed mesh, or flag an in-flight load
    fn evict(&mut self, ticket: ChunkTicket, display: &mut dyn DisplaySink) {
        let Some(chunk) = self.chunks.get_mut(&ticket) else {
            return;
        };
        match chunk.state {
            LifecycleState::Loading => {
                chunk.state = LifecycleState::Unloaded;
                self.index.remove(&chunk.key);
            }
            LifecycleState::Loaded => {
                if let Some(handle) = chunk.display.take() {
                    display.remove_displayable(handle);
                }
                let key = chunk.key;
                self.chunks.remove(&ticket);
                self.index.remove(&key);
            }
            LifecycleState::Unloaded => {}
        }
    }

    /// Evict everything (world change or shutdown)
    pub fn clear(&mut self, display: &mut dyn DisplaySink) {
        let live: Vec<ChunkTicket> = self.index.values().copied().collect();
        for ticket in live {
            self.evict(ticket, display);
        }
    }

    /// Live chunks (loading or loaded)
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn count(&self, state: LifecycleState) -> usize {
        self.chunks.values().filter(|c| c.state == state).count()
    }

    /// Live chunks, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.index.values().filter_map(|t| self.chunks.get(t))
    }
}

/// Fetcher that only records requests; completions are fed back by hand
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingFetcher {
    pub requests: Vec<(ChunkTicket, String)>,
}

#[cfg(test)]
impl ChunkFetcher for RecordingFetcher {
    fn request(&mut self, ticket: ChunkTicket, path: String) {
        self.requests.push((ticket, path));
    }
}

/// Display sink that records calls
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingDisplay {
    pub added: Vec<(ChunkKey, Vec3, DisplayHandle)>,
    pub removed: Vec<DisplayHandle>,
}

#[cfg(test)]
impl RecordingDisplay {
    pub fn calls(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

#[cfg(test)]
impl DisplaySink for RecordingDisplay {
    fn add_displayable(
        &mut self,
        key: ChunkKey,
        _mesh: MeshBuffer,
        position: Vec3,
    ) -> DisplayHandle {
        let handle = DisplayHandle(self.added.len() as u64 + 1);
        self.added.push((key, position, handle));
        handle
    }

    fn remove_displayable(&mut self, handle: DisplayHandle) {
        self.removed.push(handle);
    }
}
