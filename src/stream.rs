//! Streaming reducer: live message batches → per-path samples.
//!
//! The reducer owns the stream-derived view and is driven synchronously by the
//! host, one batch at a time. Live data is contiguous, so every path has a
//! single ever-growing segment (index 0).
//!
//! # Change signalling
//!
//! The view is handed out as an `Arc<PathRanges>` snapshot. A batch that
//! changes nothing leaves the snapshot pointer-equal to the previous one. A
//! batch that changes something copies on write: a held snapshot is never
//! mutated, and paths the batch did not touch keep pointer-equal per-path
//! `Arc`s in the new snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use crate::path::{PathEvaluator, PathIndex};
use crate::source::MessageEvent;
use crate::types::{PathKey, PathRanges, Sample, Segment};

/// Outcome of applying a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeResult {
    pub changed: bool,
}

impl ChangeResult {
    pub const UNCHANGED: ChangeResult = ChangeResult { changed: false };
    pub const CHANGED: ChangeResult = ChangeResult { changed: true };
}

/// Incrementally builds the stream-derived view
pub struct StreamingReducer {
    evaluator: Arc<dyn PathEvaluator>,
    index: Arc<PathIndex>,
    /// Paths served by preloaded blocks; live data for them is redundant
    block_covered: HashSet<PathKey>,
    single_message_mode: bool,
    /// Trailing window in seconds, when following
    following_width: Option<f64>,
    state: Arc<PathRanges>,
}

impl StreamingReducer {
    pub fn new(evaluator: Arc<dyn PathEvaluator>) -> Self {
        Self {
            evaluator,
            index: Arc::new(PathIndex::default()),
            block_covered: HashSet::new(),
            single_message_mode: false,
            following_width: None,
            state: Arc::new(PathRanges::new()),
        }
    }

    /// Switch to a new path index, keeping data only for paths still present
    pub fn restore(&mut self, index: Arc<PathIndex>) {
        let stale = self.state.keys().any(|key| !index.contains(key.as_str()));
        if stale {
            let state = Arc::make_mut(&mut self.state);
            let before = state.len();
            state.retain(|key, _| index.contains(key.as_str()));
            tracing::debug!("Dropped live data for {} removed paths", before - state.len());
        }
        self.index = index;
    }

    /// Set the paths whose data comes from blocks
    pub fn set_block_covered(&mut self, paths: HashSet<PathKey>) {
        self.block_covered = paths;
    }

    /// Keep only the newest sample per path. Switching modes clears the view.
    pub fn set_single_message_mode(&mut self, enabled: bool) {
        if self.single_message_mode != enabled {
            self.single_message_mode = enabled;
            self.reset();
        }
    }

    /// Trailing window width in seconds; `None` keeps everything
    pub fn set_following_width(&mut self, width: Option<f64>) {
        self.following_width = width.filter(|w| w.is_finite() && *w > 0.0);
    }

    /// Drop all accumulated live data
    pub fn reset(&mut self) {
        if !self.state.is_empty() {
            self.state = Arc::new(PathRanges::new());
        }
    }

    /// Apply one batch of live events, in delivery order
    pub fn apply(&mut self, events: &[MessageEvent]) -> ChangeResult {
        let index = Arc::clone(&self.index);
        let mut changed = false;

        for event in events {
            let keys = index.paths_for_topic(&event.topic);
            if keys.is_empty() {
                continue;
            }
            let mut header_time = None;
            for key in keys {
                if self.block_covered.contains(key) {
                    continue;
                }
                let Some(parsed) = index.parsed(key.as_str()) else {
                    continue;
                };
                let Some(value) = self.evaluator.evaluate(parsed, &event.message) else {
                    continue;
                };
                let header = *header_time
                    .get_or_insert_with(|| self.evaluator.header_time(&event.message));
                let sample = Sample::new(value, event.receive_time).with_header_time(header);
                self.push(key, sample);
                changed = true;
            }
        }

        if changed {
            tracing::trace!("Applied live batch of {} events", events.len());
        }
        ChangeResult { changed }
    }

    fn push(&mut self, key: &PathKey, sample: Sample) {
        let state = Arc::make_mut(&mut self.state);
        let segments = Arc::make_mut(state.entry(key.clone()).or_default());

        if self.single_message_mode {
            segments.clear();
            segments.push(Segment::from_iter([sample]));
            return;
        }

        if segments.is_empty() {
            segments.push(Segment::new());
        }
        let live = &mut segments[0];
        let receive_time = sample.receive_time;
        live.push(sample);
        if let Some(width) = self.following_width {
            live.trim_before(receive_time.saturating_sub_secs(width));
        }
    }

    /// Snapshot of the stream-derived view
    pub fn state(&self) -> Arc<PathRanges> {
        Arc::clone(&self.state)
    }

    pub fn ranges(&self) -> &PathRanges {
        &self.state
    }
}

impl std::fmt::Debug for StreamingReducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingReducer")
            .field("paths", &self.state.len())
            .field("block_covered", &self.block_covered.len())
            .field("single_message_mode", &self.single_message_mode)
            .field("following_width", &self.following_width)
            .finish()
    }
}
