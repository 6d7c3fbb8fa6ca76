//! Block accumulator: preloaded history → per-path, gap-aware segments.
//!
//! Blocks arrive as an ordered sequence of slots (`None` while a slot is not
//! loaded yet). Each block is turned into per-path samples exactly once; the
//! result is cached against the block's identity and reused whenever the same
//! block is walked again.
//!
//! # Segments
//!
//! Walking blocks in index order, a path's samples are appended to its open
//! segment only when the previous block also contributed to that path.
//! Otherwise a new segment starts, so a missing or empty block shows up as a
//! gap instead of a line drawn across it:
//!
//! ```text
//! block:    0      1      2      3
//! /a.x:   [s1 s2] [s3]   [ ]    [s4]    → [s1 s2 s3] [s4]
//! ```
//!
//! # Incremental walks
//!
//! When the already-walked slots are unchanged, only newly delivered slots are
//! walked. A replaced or truncated sequence, a new path index, or an explicit
//! reset recomputes from scratch (cache hits keep that cheap).
//!
//! Only block-covered paths are extracted. Other topics in a block belong to
//! the live stream and are left out, even when the block carries them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use crate::path::{PathEvaluator, PathIndex};
use crate::source::{Block, BlockData};
use crate::types::{PathKey, PathRanges, Sample, Segment};

/// Frozen per-path samples extracted from one block
pub type BlockExtraction = HashMap<PathKey, Arc<[Sample]>>;

struct CacheEntry {
    block: Weak<BlockData>,
    extraction: Arc<BlockExtraction>,
}

/// Cache of block extractions keyed by block identity.
///
/// Entries hold a `Weak` to their block, which keeps the allocation (and so
/// the address used as key) from being reused while the entry exists. Entries
/// whose block has been dropped by the source are removed by [`prune`].
///
/// [`prune`]: BlockCache::prune
#[derive(Default)]
pub struct BlockCache {
    entries: HashMap<usize, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached extraction for `block` or compute and cache it
    pub fn get_or_extract(
        &mut self,
        block: &Block,
        extract: impl FnOnce(&BlockData) -> BlockExtraction,
    ) -> Arc<BlockExtraction> {
        let key = Arc::as_ptr(block) as usize;
        if let Some(entry) = self.entries.get(&key) {
            if entry.block.strong_count() > 0 {
                self.hits += 1;
                return Arc::clone(&entry.extraction);
            }
        }

        self.misses += 1;
        let extraction = Arc::new(extract(block));
        self.entries.insert(
            key,
            CacheEntry {
                block: Arc::downgrade(block),
                extraction: Arc::clone(&extraction),
            },
        );
        extraction
    }

    /// Drop entries for blocks nobody holds anymore. Returns the number removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.block.strong_count() > 0);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache")
            .field("entries", &self.entries.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

/// Extract samples for the `covered` paths from one block.
/// Pure in `(index, covered, block)`.
pub fn extract_block(
    index: &PathIndex,
    covered: &HashSet<PathKey>,
    evaluator: &dyn PathEvaluator,
    block: &BlockData,
) -> BlockExtraction {
    let mut by_path: HashMap<PathKey, Vec<Sample>> = HashMap::new();
    for (topic, keys) in index.iter() {
        if !keys.iter().any(|key| covered.contains(key)) {
            continue;
        }
        for event in block.messages(topic) {
            let mut header_time = None;
            for key in keys.iter().filter(|key| covered.contains(*key)) {
                let Some(parsed) = index.parsed(key.as_str()) else {
                    continue;
                };
                let Some(value) = evaluator.evaluate(parsed, &event.message) else {
                    continue;
                };
                let header =
                    *header_time.get_or_insert_with(|| evaluator.header_time(&event.message));
                by_path
                    .entry(key.clone())
                    .or_default()
                    .push(Sample::new(value, event.receive_time).with_header_time(header));
            }
        }
    }
    by_path
        .into_iter()
        .map(|(key, samples)| (key, Arc::from(samples)))
        .collect()
}

/// Builds and incrementally extends the block-derived view
pub struct BlockAccumulator {
    evaluator: Arc<dyn PathEvaluator>,
    index: Arc<PathIndex>,
    /// Paths whose data comes from blocks
    covered: HashSet<PathKey>,
    single_message_mode: bool,
    cache: BlockCache,
    /// Identity of each slot already walked, up to the last loaded one
    walked: Vec<Option<Weak<BlockData>>>,
    /// Last block index that contributed to each path's open segment
    last_block_index: HashMap<PathKey, usize>,
    ranges: PathRanges,
}

impl BlockAccumulator {
    pub fn new(evaluator: Arc<dyn PathEvaluator>) -> Self {
        Self {
            evaluator,
            index: Arc::new(PathIndex::default()),
            covered: HashSet::new(),
            single_message_mode: false,
            cache: BlockCache::new(),
            walked: Vec::new(),
            last_block_index: HashMap::new(),
            ranges: PathRanges::new(),
        }
    }

    /// Switch to a new path index. Everything derived from the old one is dropped.
    pub fn set_index(&mut self, index: Arc<PathIndex>) {
        if Arc::ptr_eq(&self.index, &index) {
            return;
        }
        self.index = index;
        self.reset();
    }

    /// Restrict extraction to `paths`. A different set invalidates every
    /// cached extraction.
    pub fn set_block_covered(&mut self, paths: HashSet<PathKey>) {
        if self.covered == paths {
            return;
        }
        tracing::debug!("Block-covered paths changed to {} paths", paths.len());
        self.covered = paths;
        self.reset();
    }

    /// In single-message mode blocks are ignored and the view stays empty
    pub fn set_single_message_mode(&mut self, enabled: bool) {
        if self.single_message_mode != enabled {
            self.single_message_mode = enabled;
            self.clear_ranges();
        }
    }

    /// Forget all derived state, including the extraction cache
    pub fn reset(&mut self) {
        self.cache.clear();
        self.clear_ranges();
    }

    fn clear_ranges(&mut self) {
        self.walked.clear();
        self.last_block_index.clear();
        self.ranges = PathRanges::new();
    }

    /// Memoized extraction of a single block
    pub fn extract(&mut self, block: &Block) -> Arc<BlockExtraction> {
        let index = &self.index;
        let covered = &self.covered;
        let evaluator = &*self.evaluator;
        self.cache
            .get_or_extract(block, |data| extract_block(index, covered, evaluator, data))
    }

    /// Bring the view up to date with `blocks` and return it
    pub fn accumulate(&mut self, blocks: &[Option<Block>]) -> &PathRanges {
        if self.single_message_mode {
            return &self.ranges;
        }

        let evicted = self.cache.prune();
        if evicted > 0 {
            tracing::trace!("Evicted {} dropped blocks from extraction cache", evicted);
        }

        if !self.walked_prefix_matches(blocks) {
            tracing::debug!(
                "Block sequence changed ({} walked, {} delivered), recomputing",
                self.walked.len(),
                blocks.len()
            );
            self.clear_ranges();
        }

        let end = blocks
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1);
        for idx in self.walked.len()..end {
            let Some(block) = &blocks[idx] else {
                self.walked.push(None);
                continue;
            };
            let extraction = self.extract(block);
            for (key, samples) in extraction.iter() {
                self.append(key, idx, samples);
            }
            self.walked.push(Some(Arc::downgrade(block)));
        }

        &self.ranges
    }

    fn walked_prefix_matches(&self, blocks: &[Option<Block>]) -> bool {
        blocks.len() >= self.walked.len()
            && self
                .walked
                .iter()
                .zip(blocks)
                .all(|(walked, delivered)| match (walked, delivered) {
                    (None, None) => true,
                    (Some(w), Some(b)) => std::ptr::eq(w.as_ptr(), Arc::as_ptr(b)),
                    _ => false,
                })
    }

    fn append(&mut self, key: &PathKey, idx: usize, samples: &[Sample]) {
        if samples.is_empty() {
            return;
        }
        let contiguous = self
            .last_block_index
            .get(key)
            .is_some_and(|&last| last + 1 == idx);
        let segments = Arc::make_mut(self.ranges.entry(key.clone()).or_default());
        match segments.last_mut() {
            Some(open) if contiguous => open.extend_from_slice(samples),
            _ => segments.push(Segment::from_slice(samples)),
        }
        self.last_block_index.insert(key.clone(), idx);
    }

    /// Current block-derived view
    pub fn ranges(&self) -> &PathRanges {
        &self.ranges
    }

    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }
}

impl std::fmt::Debug for BlockAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockAccumulator")
            .field("paths", &self.index.path_count())
            .field("covered", &self.covered.len())
            .field("walked", &self.walked.len())
            .field("single_message_mode", &self.single_message_mode)
            .field("cache", &self.cache)
            .finish()
    }
}
