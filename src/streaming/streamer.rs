//! Budgeted nearest-first load scheduling for the active view

use glam::IVec2;

use crate::core::StreamingConfig;
use crate::streaming::display::DisplaySink;
use crate::streaming::registry::{ChunkFetcher, ChunkRegistry};
use crate::streaming::spiral::load_spiral;
use crate::streaming::view::ViewId;

/// Summary of one streaming tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Active view, `None` when the observer is closer than every threshold
    pub view: Option<ViewId>,
    /// Observer cell in view-local coordinates
    pub origin: IVec2,
    pub evicted: usize,
    /// Loads issued this tick (never more than `max_loads_per_tick`)
    pub requested: u32,
}

/// Walks the load spiral around the observer under a per-tick budget
#[derive(Clone, Debug)]
pub struct ChunkStreamer {
    load_distance: u32,
    unload_distance: u32,
    max_loads_per_tick: u32,
}

impl ChunkStreamer {
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            load_distance: config.load_distance,
            unload_distance: config.unload_distance,
            max_loads_per_tick: config.max_loads_per_tick,
        }
    }

    pub fn load_distance(&self) -> u32 {
        self.load_distance
    }

    pub fn unload_distance(&self) -> u32 {
        self.unload_distance
    }

    pub fn max_loads_per_tick(&self) -> u32 {
        self.max_loads_per_tick
    }

    /// Evict out-of-range chunks, then request missing cells nearest first.
    ///
    /// `observer_chunk` is in source-chunk units; it is rescaled to cells of
    /// the view's `chunk_span` by flooring division.
    pub fn stream_tick(
        &self,
        registry: &mut ChunkRegistry,
        view: ViewId,
        observer_chunk: IVec2,
        fetcher: &mut dyn ChunkFetcher,
        display: &mut dyn DisplaySink,
    ) -> TickReport {
        let Some(span) = registry.views().get(view).map(|v| v.chunk_span) else {
            log::warn!("Stream tick for unknown view {:?}", view);
            return TickReport::default();
        };
        let origin = IVec2::new(
            observer_chunk.x.div_euclid(span),
            observer_chunk.y.div_euclid(span),
        );

        let evicted =
            registry.evict_out_of_range(view, origin.x, origin.y, self.unload_distance, display);

        let requested = load_spiral(self.load_distance, self.max_loads_per_tick, |dx, dz| {
            registry.needs_load(view, origin.x + dx, origin.y + dz, &mut *fetcher)
        });

        if requested > 0 {
            log::debug!(
                "View {:?} at {}: requested {} chunks, evicted {}",
                view, origin, requested, evicted
            );
        }

        TickReport {
            view: Some(view),
            origin,
            evicted,
            requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::mesh::MeshBuffer;
    use crate::streaming::registry::{ChunkKey, RecordingDisplay, RecordingFetcher};
    use crate::streaming::view::{View, ViewSet};

    fn registry() -> ChunkRegistry {
        let views = ViewSet::new(vec![
            View::new("near", 1, 0.0).unwrap(),
            View::new("far", 4, 500.0).unwrap(),
        ])
        .unwrap();
        ChunkRegistry::new(views, 16.0)
    }

    const FAR: ViewId = ViewId(0);
    const NEAR: ViewId = ViewId(1);

    fn streamer(load: u32, unload: u32, cap: u32) -> ChunkStreamer {
        ChunkStreamer::new(&StreamingConfig {
            load_distance: load,
            unload_distance: unload,
            max_loads_per_tick: cap,
            ..StreamingConfig::default()
        })
    }

    fn complete_all(
        registry: &mut ChunkRegistry,
        fetcher: &mut RecordingFetcher,
        display: &mut RecordingDisplay,
    ) {
        for (ticket, _) in fetcher.requests.drain(..) {
            registry.complete_load(ticket, Ok(MeshBuffer::default()), display).unwrap();
        }
    }

    #[test]
    fn test_budget_cap_per_tick() {
        let mut registry = registry();
        let mut fetcher = RecordingFetcher::default();
        let mut display = RecordingDisplay::default();
        let streamer = streamer(14, 16, 8);

        let report =
            streamer.stream_tick(&mut registry, NEAR, IVec2::ZERO, &mut fetcher, &mut display);
        assert_eq!(report.requested, 8);
        assert_eq!(fetcher.requests.len(), 8);
        assert_eq!(report.view, Some(NEAR));

        // Second tick picks up where the first stopped
        let report =
            streamer.stream_tick(&mut registry, NEAR, IVec2::ZERO, &mut fetcher, &mut display);
        assert_eq!(report.requested, 8);
        assert_eq!(registry.len(), 16);
    }

    #[test]
    fn test_nearest_cells_requested_first() {
        let mut registry = registry();
        let mut fetcher = RecordingFetcher::default();
        let mut display = RecordingDisplay::default();
        let streamer = streamer(14, 16, 9);

        streamer.stream_tick(&mut registry, NEAR, IVec2::new(10, -3), &mut fetcher, &mut display);
        let ring: Vec<i32> = registry
            .iter()
            .map(|c| (c.key.x - 10).abs().max((c.key.z + 3).abs()))
            .collect();
        assert_eq!(ring.len(), 9);
        assert!(ring.iter().all(|&r| r <= 1));
    }

    #[test]
    fn test_fills_bounded_square_then_idles() {
        let mut registry = registry();
        let mut fetcher = RecordingFetcher::default();
        let mut display = RecordingDisplay::default();
        let streamer = streamer(4, 6, 100);

        let report =
            streamer.stream_tick(&mut registry, NEAR, IVec2::ZERO, &mut fetcher, &mut display);
        assert_eq!(report.requested, 16);
        complete_all(&mut registry, &mut fetcher, &mut display);

        let report =
            streamer.stream_tick(&mut registry, NEAR, IVec2::ZERO, &mut fetcher, &mut display);
        assert_eq!(report.requested, 0);
        assert_eq!(report.evicted, 0);
        assert!(registry.contains(ChunkKey::new(NEAR, 2, 2)));
        assert!(!registry.contains(ChunkKey::new(NEAR, -2, 0)));
    }

    #[test]
    fn test_origin_rescaled_to_view_span() {
        let mut registry = registry();
        let mut fetcher = RecordingFetcher::default();
        let mut display = RecordingDisplay::default();
        let streamer = streamer(1, 2, 8);

        let observer = IVec2::new(-1, 9);
        let report = streamer.stream_tick(&mut registry, FAR, observer, &mut fetcher, &mut display);
        assert_eq!(report.origin, IVec2::new(-1, 2));
        assert_eq!(report.requested, 1);
        assert!(registry.contains(ChunkKey::new(FAR, -1, 2)));
    }

    #[test]
    fn test_moving_observer_evicts_behind() {
        let mut registry = registry();
        let mut fetcher = RecordingFetcher::default();
        let mut display = RecordingDisplay::default();
        let streamer = streamer(4, 4, 100);

        streamer.stream_tick(&mut registry, NEAR, IVec2::ZERO, &mut fetcher, &mut display);
        complete_all(&mut registry, &mut fetcher, &mut display);

        let observer = IVec2::new(20, 0);
        let report =
            streamer.stream_tick(&mut registry, NEAR, observer, &mut fetcher, &mut display);
        assert_eq!(report.evicted, 16);
        assert_eq!(display.removed.len(), 16);
        assert!(registry.iter().all(|c| c.key.x >= 18));
    }

    #[test]
    fn test_view_switch_evicts_previous_view() {
        let mut registry = registry();
        let mut fetcher = RecordingFetcher::default();
        let mut display = RecordingDisplay::default();
        let streamer = streamer(2, 4, 100);

        streamer.stream_tick(&mut registry, NEAR, IVec2::ZERO, &mut fetcher, &mut display);
        complete_all(&mut registry, &mut fetcher, &mut display);
        assert_eq!(registry.len(), 4);

        let report =
            streamer.stream_tick(&mut registry, FAR, IVec2::ZERO, &mut fetcher, &mut display);
        assert_eq!(report.evicted, 4);
        assert!(registry.iter().all(|c| c.key.view == FAR));
    }

    #[test]
    fn test_unknown_view_is_noop() {
        let mut registry = registry();
        let mut fetcher = RecordingFetcher::default();
        let mut display = RecordingDisplay::default();
        let streamer = streamer(4, 4, 4);
        let report =
            streamer.stream_tick(&mut registry, ViewId(7), IVec2::ZERO, &mut fetcher, &mut display);
        assert_eq!(report, TickReport::default());
        assert!(fetcher.requests.is_empty());
    }
}
