//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use plotdata_rs::{PathRanges, Segment};

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Receive-time seconds of every sample, one list per segment
pub fn segment_seconds(ranges: &PathRanges, key: &str) -> Vec<Vec<u32>> {
    ranges
        .get(key)
        .map(|segments| {
            segments
                .iter()
                .map(|seg: &Segment| seg.iter().map(|s| s.receive_time.sec).collect())
                .collect()
        })
        .unwrap_or_default()
}
