//! Property-based tests for block accumulation and stream trimming

mod common;

use std::sync::Arc;

use common::builders::{odom_event, BlockBuilder};
use plotdata_rs::{
    Block, BlockAccumulator, JsonPathEvaluator, MessageEvent, PathIndex, PlotPath,
    StreamingReducer, Time,
};
use proptest::prelude::*;

fn index(paths: &[&str]) -> Arc<PathIndex> {
    let configured: Vec<PlotPath> = paths.iter().map(|p| PlotPath::new(*p)).collect();
    Arc::new(PathIndex::build(&configured, &JsonPathEvaluator::new()))
}

/// Accumulator over `/a.x` with every indexed path block-covered
fn accumulator() -> BlockAccumulator {
    let index = index(&["/a.x"]);
    let mut acc = BlockAccumulator::new(Arc::new(JsonPathEvaluator::new()));
    acc.set_block_covered(index.keys().cloned().collect());
    acc.set_index(index);
    acc
}

/// `None` = unloaded slot, `Some(true)` = block with `/a` data,
/// `Some(false)` = block with only `/b` data
fn blocks_from_layout(layout: &[Option<bool>]) -> Vec<Option<Block>> {
    layout
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.map(|has_a| {
                let sec = i as u32;
                if has_a {
                    BlockBuilder::new().topic("/a", &[sec]).build()
                } else {
                    BlockBuilder::new().topic("/b", &[sec]).build()
                }
            })
        })
        .collect()
}

fn contributing_runs(layout: &[Option<bool>]) -> usize {
    let mut runs = 0;
    let mut in_run = false;
    for slot in layout {
        let contributes = *slot == Some(true);
        if contributes && !in_run {
            runs += 1;
        }
        in_run = contributes;
    }
    runs
}

proptest! {
    #[test]
    fn test_segments_match_contributing_runs(
        layout in prop::collection::vec(prop::option::of(any::<bool>()), 1..24)
    ) {
        let mut acc = accumulator();
        let blocks = blocks_from_layout(&layout);
        let ranges = acc.accumulate(&blocks);

        let segments = ranges.get("/a.x").map_or(0, |s| s.len());
        prop_assert_eq!(segments, contributing_runs(&layout));

        let samples: usize = ranges.get("/a.x").map_or(0, |s| s.iter().map(|seg| seg.len()).sum());
        let expected = layout.iter().filter(|s| **s == Some(true)).count();
        prop_assert_eq!(samples, expected);
    }

    #[test]
    fn test_incremental_delivery_matches_full_delivery(
        layout in prop::collection::vec(prop::option::of(any::<bool>()), 1..16)
    ) {
        let blocks = blocks_from_layout(&layout);

        let mut incremental = accumulator();
        for end in 1..=blocks.len() {
            incremental.accumulate(&blocks[..end]);
        }

        let mut full = accumulator();
        prop_assert_eq!(incremental.ranges(), full.accumulate(&blocks));
    }

    #[test]
    fn test_following_trim_never_keeps_old_samples(
        steps in prop::collection::vec(0u32..3_000, 1..60),
        width_ms in 1u32..10_000,
        batch_size in 1usize..8,
    ) {
        let mut reducer = StreamingReducer::new(Arc::new(JsonPathEvaluator::new()));
        reducer.restore(index(&["/odom.x"]));
        let width = width_ms as f64 / 1000.0;
        reducer.set_following_width(Some(width));

        let mut nanos: u64 = 0;
        let events: Vec<MessageEvent> = steps
            .iter()
            .map(|step_ms| {
                nanos += *step_ms as u64 * 1_000_000;
                let mut event = odom_event("/odom", 0, 0.0);
                event.receive_time = Time::new((nanos / 1_000_000_000) as u32, (nanos % 1_000_000_000) as u32);
                event
            })
            .collect();
        for batch in events.chunks(batch_size) {
            reducer.apply(batch);
        }

        let newest = events.last().map(|e| e.receive_time).unwrap();
        let cutoff = newest.saturating_sub_secs(width);
        let segments = &reducer.ranges()["/odom.x"];
        prop_assert_eq!(segments.len(), 1);
        prop_assert!(segments[0].iter().all(|s| s.receive_time >= cutoff));
        prop_assert_eq!(segments[0].last().map(|s| s.receive_time), Some(newest));
    }
}
