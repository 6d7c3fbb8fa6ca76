//! Block accumulation across growing, gapped and replaced block sequences

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::builders::BlockBuilder;
use common::segment_seconds;
use plotdata_rs::path::{ParsedPath, PathEvaluator};
use plotdata_rs::{BlockAccumulator, JsonPathEvaluator, PathIndex, PlotPath, Time};
use serde_json::Value;

/// Delegates to the JSON evaluator and counts evaluations
#[derive(Default)]
struct CountingEvaluator {
    inner: JsonPathEvaluator,
    evaluations: AtomicUsize,
}

impl CountingEvaluator {
    fn count(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

impl PathEvaluator for CountingEvaluator {
    fn parse(&self, path: &str) -> Option<ParsedPath> {
        self.inner.parse(path)
    }

    fn evaluate(&self, path: &ParsedPath, message: &Value) -> Option<Value> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        self.inner.evaluate(path, message)
    }

    fn header_time(&self, message: &Value) -> Option<Time> {
        self.inner.header_time(message)
    }
}

fn accumulator(paths: &[&str]) -> (BlockAccumulator, Arc<CountingEvaluator>) {
    let evaluator = Arc::new(CountingEvaluator::default());
    let configured: Vec<PlotPath> = paths.iter().map(|p| PlotPath::new(*p)).collect();
    let index = Arc::new(PathIndex::build(&configured, &*evaluator));
    let mut accumulator = BlockAccumulator::new(evaluator.clone());
    accumulator.set_block_covered(index.keys().cloned().collect());
    accumulator.set_index(index);
    (accumulator, evaluator)
}

#[test]
fn test_block_builder() {
    let block = BlockBuilder::new().topic("/a", &[1, 2]).topic("/b", &[3]).build();
    assert_eq!(block.messages("/a").len(), 2);
    assert_eq!(block.message_count(), 3);
}

#[test]
fn test_reprocessing_same_blocks_is_idempotent() {
    let (mut acc, evaluator) = accumulator(&["/a.x"]);
    let blocks = vec![
        Some(BlockBuilder::new().topic("/a", &[1, 2]).build()),
        Some(BlockBuilder::new().topic("/a", &[3]).build()),
    ];

    let first = acc.accumulate(&blocks).clone();
    let calls = evaluator.count();
    assert_eq!(calls, 3);

    let second = acc.accumulate(&blocks).clone();
    assert_eq!(evaluator.count(), calls);
    assert_eq!(first, second);
}

#[test]
fn test_replaced_block_is_reextracted_but_others_are_not() {
    let (mut acc, evaluator) = accumulator(&["/a.x"]);
    let kept = BlockBuilder::new().topic("/a", &[1]).build();
    acc.accumulate(&[Some(kept.clone()), Some(BlockBuilder::new().topic("/a", &[2]).build())]);
    assert_eq!(evaluator.count(), 2);

    let replacement = BlockBuilder::new().topic("/a", &[2, 3]).build();
    let ranges = acc.accumulate(&[Some(kept), Some(replacement)]);
    assert_eq!(segment_seconds(ranges, "/a.x"), vec![vec![1, 2, 3]]);
    // Only the replacement block was evaluated again
    assert_eq!(evaluator.count(), 4);
}

#[test]
fn test_unloaded_slot_splits_segments() {
    let (mut acc, _) = accumulator(&["/a.x"]);
    let ranges = acc.accumulate(&[
        Some(BlockBuilder::new().topic("/a", &[1, 2]).build()),
        None,
        Some(BlockBuilder::new().topic("/a", &[5]).build()),
    ]);
    assert_eq!(segment_seconds(ranges, "/a.x"), vec![vec![1, 2], vec![5]]);
}

#[test]
fn test_block_without_topic_data_splits_segments() {
    let (mut acc, _) = accumulator(&["/a.x", "/b.x"]);
    let ranges = acc.accumulate(&[
        Some(BlockBuilder::new().topic("/a", &[1]).topic("/b", &[1]).build()),
        Some(BlockBuilder::new().topic("/b", &[2]).build()),
        Some(BlockBuilder::new().topic("/a", &[3]).topic("/b", &[3]).build()),
    ]);
    assert_eq!(segment_seconds(ranges, "/a.x"), vec![vec![1], vec![3]]);
    assert_eq!(segment_seconds(ranges, "/b.x"), vec![vec![1, 2, 3]]);
}

#[test]
fn test_contiguous_blocks_merge_into_one_segment() {
    let (mut acc, _) = accumulator(&["/a.x"]);
    let blocks: Vec<_> = (1..=4)
        .map(|s| Some(BlockBuilder::new().topic("/a", &[s]).build()))
        .collect();
    let ranges = acc.accumulate(&blocks);
    assert_eq!(segment_seconds(ranges, "/a.x"), vec![vec![1, 2, 3, 4]]);
}

#[test]
fn test_growing_sequence_fills_gap() {
    let (mut acc, evaluator) = accumulator(&["/a.x"]);
    let first = BlockBuilder::new().topic("/a", &[1]).build();
    let third = BlockBuilder::new().topic("/a", &[3]).build();

    let ranges = acc.accumulate(&[Some(first.clone()), None, Some(third.clone())]);
    assert_eq!(segment_seconds(ranges, "/a.x"), vec![vec![1], vec![3]]);

    // The hole is filled in: the walked prefix no longer matches, so the
    // sequence is recomputed from cached extractions
    let second = BlockBuilder::new().topic("/a", &[2]).build();
    let ranges = acc.accumulate(&[Some(first), Some(second), Some(third)]);
    assert_eq!(segment_seconds(ranges, "/a.x"), vec![vec![1, 2, 3]]);
    assert_eq!(evaluator.count(), 3);
}
