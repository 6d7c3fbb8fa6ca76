//! Merge & publish: combine block and stream views for the renderer.
//!
//! Block data always wins for a path present in both views. Block coverage
//! means the path's history is already complete, so overlapping ranges are
//! never stitched together.

use std::sync::Arc;

use crate::dataset::PlotDataset;
use crate::types::{PathRanges, PlotPath};
use crate::view::ViewWindow;

/// Union of both views keyed by path, block entries taking precedence.
///
/// Per-path entries are shared, not copied.
pub fn merge(block_view: &PathRanges, stream_view: &PathRanges) -> PathRanges {
    let mut merged = PathRanges::with_capacity(block_view.len() + stream_view.len());
    for (key, segments) in stream_view {
        if !block_view.contains_key(key) {
            merged.insert(key.clone(), Arc::clone(segments));
        }
    }
    for (key, segments) in block_view {
        merged.insert(key.clone(), Arc::clone(segments));
    }
    merged
}

/// Everything the renderer needs for one frame
#[derive(Debug, Clone)]
pub struct PlotPublication {
    /// Configured series, in drawing order
    pub paths: Vec<PlotPath>,
    /// Merged samples per path
    pub merged: Arc<PathRanges>,
    /// Requested x-range, if any
    pub view_window: Option<ViewWindow>,
    /// Playback head in seconds since start (timestamp mode only)
    pub current_time_since_start: Option<f64>,
}

/// Draws published plot data. Rendering technology is up to the implementor.
pub trait PlotRenderer {
    fn render(&mut self, publication: &PlotPublication, datasets: &[PlotDataset]);
}
