//! Level-of-detail views and active view selection
//!
//! A world export provides several views of the same terrain: each groups
//! `chunk_span` x `chunk_span` source chunks into one mesh file and becomes
//! active once the observer is farther away than its distance threshold.

use std::sync::Arc;

use crate::core::{Error, Result};

/// Chunks per region edge; a view's `chunk_span` must divide it
pub const REGION_CHUNKS: i32 = 32;

/// Index of a view within its [`ViewSet`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub usize);

/// One level-of-detail definition
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    /// Mesh files are named `{filename_prefix}.{x}.{z}.m`
    pub filename_prefix: String,
    /// Source chunks per view cell edge (1..=32, divides 32)
    pub chunk_span: i32,
    /// The view is eligible once the observer is farther than this
    pub distance_threshold: f64,
}

impl View {
    pub fn new(
        filename_prefix: impl Into<String>,
        chunk_span: i32,
        distance_threshold: f64,
    ) -> Result<Self> {
        let view = Self {
            filename_prefix: filename_prefix.into(),
            chunk_span,
            distance_threshold,
        };
        view.validate()?;
        Ok(view)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=REGION_CHUNKS).contains(&self.chunk_span) || REGION_CHUNKS % self.chunk_span != 0 {
            return Err(Error::Manifest(format!(
                "view '{}': chunk span {} must be a divisor of {}",
                self.filename_prefix, self.chunk_span, REGION_CHUNKS
            )));
        }
        if self.distance_threshold.is_nan() {
            return Err(Error::Manifest(format!(
                "view '{}': distance threshold is NaN",
                self.filename_prefix
            )));
        }
        Ok(())
    }

    /// View cells per region edge
    pub fn cells_per_region(&self) -> i32 {
        REGION_CHUNKS / self.chunk_span
    }
}

/// The fixed views of one world, sorted by distance threshold descending.
///
/// Cheap to clone; all clones share the same views.
#[derive(Clone, Debug)]
pub struct ViewSet {
    views: Arc<[View]>,
}

impl ViewSet {
    /// Sort `views` by distance threshold, farthest first.
    ///
    /// The sort is stable, so views with equal thresholds keep their input order.
    pub fn new(mut views: Vec<View>) -> Result<Self> {
        for view in &views {
            view.validate()?;
        }
        views.sort_by(|a, b| b.distance_threshold.total_cmp(&a.distance_threshold));
        Ok(Self {
            views: views.into(),
        })
    }

    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Views with their ids, farthest threshold first
    pub fn iter(&self) -> impl Iterator<Item = (ViewId, &View)> {
        self.views.iter().enumerate().map(|(i, v)| (ViewId(i), v))
    }

    /// Pick the active view for an observer at `observer_distance`.
    ///
    /// Returns the first view (in threshold-descending order) whose threshold
    /// is strictly below the distance, or `None` when the observer is closer
    /// than every threshold.
    pub fn select_view(&self, observer_distance: f64) -> Option<ViewId> {
        self.iter()
            .find(|(_, view)| view.distance_threshold < observer_distance)
            .map(|(id, _)| id)
    }
}
