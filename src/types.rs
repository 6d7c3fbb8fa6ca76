//! Core data types for plotdata-rs
//!
//! This module contains the fundamental data structures shared by every stage
//! of the plot data pipeline.
//!
//! # Main Types
//!
//! - [`Time`] - Robotics timestamp (seconds + nanoseconds)
//! - [`PlotPath`] - A configured series: message path plus display flags
//! - [`PathKey`] - Cheap, hashable key identifying a path expression
//! - [`Sample`] - One extracted value with its receive time and header time
//! - [`Segment`] - A contiguous run of samples with no coverage gap
//! - [`PathRanges`] - Per-path list of segments
//!
//! # Sharing
//!
//! Per-path segment lists are stored behind `Arc` so that a path whose data
//! did not change keeps pointing at the same allocation across updates.
//! Consumers can use `Arc::ptr_eq` to skip work for unchanged series.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in time as carried by robotics messages (`sec`, `nsec`).
///
/// Always normalized so that `nsec < 1_000_000_000`, which makes the derived
/// ordering (seconds first, then nanoseconds) chronological.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

impl Time {
    pub const ZERO: Time = Time { sec: 0, nsec: 0 };

    /// Create a time, carrying excess nanoseconds into seconds
    pub fn new(sec: u32, nsec: u32) -> Self {
        Self::from_nanos(sec as u64 * NANOS_PER_SEC + nsec as u64)
    }

    /// Create a time from fractional seconds. Negative and NaN inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs <= 0.0 {
            return Self::ZERO;
        }
        Self::from_nanos((secs * NANOS_PER_SEC as f64).round() as u64)
    }

    fn from_nanos(nanos: u64) -> Self {
        let sec = (nanos / NANOS_PER_SEC).min(u32::MAX as u64) as u32;
        Self {
            sec,
            nsec: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    /// Total nanoseconds since the epoch
    pub fn as_nanos(&self) -> u64 {
        self.sec as u64 * NANOS_PER_SEC + self.nsec as u64
    }

    /// Fractional seconds since the epoch
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 / NANOS_PER_SEC as f64
    }

    /// Signed number of seconds from `earlier` to `self`
    pub fn seconds_since(&self, earlier: Time) -> f64 {
        (self.as_nanos() as i128 - earlier.as_nanos() as i128) as f64 / NANOS_PER_SEC as f64
    }

    /// Subtract a window width in seconds, saturating at zero
    pub fn saturating_sub_secs(&self, secs: f64) -> Time {
        if secs.is_nan() || secs <= 0.0 {
            return *self;
        }
        let width = (secs * NANOS_PER_SEC as f64).round() as u64;
        Self::from_nanos(self.as_nanos().saturating_sub(width))
    }

    /// Convert to a UTC date-time for display
    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.sec as i64, self.nsec)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// Which timestamp a path's samples are plotted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimestampMethod {
    /// Time the transport delivered the message
    #[default]
    ReceiveTime,
    /// `header.stamp` inside the message, when present
    HeaderStamp,
}

/// Visual style for plotting a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PlotStyle {
    /// Standard line plot (default)
    #[default]
    Line,
    /// Scatter plot showing individual data points
    Scatter,
    /// Step plot with horizontal-then-vertical transitions
    Step,
}

impl PlotStyle {
    /// Get display name for this plot style
    pub fn display_name(&self) -> &'static str {
        match self {
            PlotStyle::Line => "Line",
            PlotStyle::Scatter => "Scatter",
            PlotStyle::Step => "Step",
        }
    }
}

/// A configured series on the plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPath {
    /// Message path expression, e.g. `/imu.linear_acceleration.x`
    pub value: String,
    /// Whether the series is drawn
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Timestamp dimension used on a timestamp x-axis
    #[serde(default)]
    pub timestamp_method: TimestampMethod,
    /// Legend label; the path expression is used when absent
    #[serde(default)]
    pub label: Option<String>,
    /// Series color (RGBA); auto-assigned by position when absent
    #[serde(default)]
    pub color: Option<[u8; 4]>,
    /// Visual style
    #[serde(default)]
    pub plot_style: PlotStyle,
}

fn default_true() -> bool {
    true
}

impl PlotPath {
    /// Create an enabled, receive-time path
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            enabled: true,
            timestamp_method: TimestampMethod::ReceiveTime,
            label: None,
            color: None,
            plot_style: PlotStyle::default(),
        }
    }

    /// Set the timestamp method
    pub fn with_timestamp_method(mut self, method: TimestampMethod) -> Self {
        self.timestamp_method = method;
        self
    }

    /// Set whether the series is drawn
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the legend label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Key under which this path's data is stored
    pub fn key(&self) -> PathKey {
        PathKey::from(self.value.as_str())
    }

    /// Label shown in the legend
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.value)
    }

    /// Configured color, or a distinct one derived from the series position
    pub fn color_or_auto(&self, index: usize) -> [u8; 4] {
        self.color.unwrap_or_else(|| generate_color(index as u32))
    }
}

/// Generate a distinct color based on an index.
/// Uses the golden ratio to spread hues evenly across the color wheel
pub fn generate_color(index: u32) -> [u8; 4] {
    const GOLDEN_RATIO: f32 = 0.618033988749895;

    let hue = ((index as f32 * GOLDEN_RATIO) % 1.0) * 360.0;
    let (r, g, b) = hsv_to_rgb(hue, 0.7, 0.85);
    [r, g, b, 255]
}

/// Convert HSV (hue 0-360, saturation 0-1, value 0-1) to RGB (u8, u8, u8)
fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> (u8, u8, u8) {
    let c = value * saturation;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = value - c;

    let (r, g, b) = match (hue / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    )
}

/// Hashable key for a path expression.
///
/// Two configured paths with the same expression share one data entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(Arc<str>);

impl PathKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PathKey {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for PathKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl Borrow<str> for PathKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PathKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One extracted value at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Value produced by the path evaluator
    pub value: serde_json::Value,
    /// Transport receive time
    pub receive_time: Time,
    /// `header.stamp` of the source message, if it had one
    pub header_time: Option<Time>,
}

impl Sample {
    pub fn new(value: serde_json::Value, receive_time: Time) -> Self {
        Self {
            value,
            receive_time,
            header_time: None,
        }
    }

    pub fn with_header_time(mut self, header_time: Option<Time>) -> Self {
        self.header_time = header_time;
        self
    }

    /// Timestamp in the requested dimension
    pub fn timestamp(&self, method: TimestampMethod) -> Option<Time> {
        match method {
            TimestampMethod::ReceiveTime => Some(self.receive_time),
            TimestampMethod::HeaderStamp => self.header_time,
        }
    }
}

/// Samples per storage chunk in a [`Segment`]
pub const SEGMENT_CHUNK_CAPACITY: usize = 512;

/// A contiguous run of samples for one path.
///
/// Samples are stored in fixed-capacity chunks behind `Arc`. Cloning a
/// segment shares every chunk; appending to a clone copies at most the open
/// tail chunk, and full chunks are never copied again. Front trimming drops
/// whole chunks and moves an offset into the first one.
#[derive(Debug, Clone, Default)]
pub struct Segment {
    chunks: VecDeque<Arc<Vec<Sample>>>,
    /// Samples already trimmed from the first chunk
    offset: usize,
    len: usize,
}

impl Segment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a frozen slice of samples into a new, growable segment
    pub fn from_slice(samples: &[Sample]) -> Self {
        let mut segment = Self::new();
        segment.extend_from_slice(samples);
        segment
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, sample: Sample) {
        let tail = self.open_tail();
        Arc::make_mut(tail).push(sample);
        self.len += 1;
    }

    pub fn extend_from_slice(&mut self, mut samples: &[Sample]) {
        while !samples.is_empty() {
            let tail = Arc::make_mut(self.open_tail());
            let (head, rest) = samples.split_at((SEGMENT_CHUNK_CAPACITY - tail.len()).min(samples.len()));
            tail.extend_from_slice(head);
            self.len += head.len();
            samples = rest;
        }
    }

    /// Last chunk if it has room, otherwise a freshly started one
    fn open_tail(&mut self) -> &mut Arc<Vec<Sample>> {
        if self
            .chunks
            .back()
            .map_or(true, |tail| tail.len() >= SEGMENT_CHUNK_CAPACITY)
        {
            self.chunks.push_back(Arc::new(Vec::new()));
        }
        let last = self.chunks.len() - 1;
        &mut self.chunks[last]
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Sample> {
        let offset = self.offset;
        self.chunks.iter().enumerate().flat_map(move |(i, chunk)| {
            let from = if i == 0 { offset } else { 0 };
            chunk[from..].iter()
        })
    }

    pub fn first(&self) -> Option<&Sample> {
        self.chunks.front().and_then(|chunk| chunk.get(self.offset))
    }

    pub fn last(&self) -> Option<&Sample> {
        self.chunks.back().and_then(|chunk| chunk.last())
    }

    /// Drop leading samples received strictly before `cutoff`.
    ///
    /// Stops at the first sample at or after the cutoff; out-of-order samples
    /// behind it are kept. Returns the number of samples removed.
    pub fn trim_before(&mut self, cutoff: Time) -> usize {
        let mut removed = 0;
        while let Some(front) = self.chunks.front() {
            let live = &front[self.offset..];
            match live.iter().position(|s| s.receive_time >= cutoff) {
                Some(keep) => {
                    self.offset += keep;
                    removed += keep;
                    break;
                }
                None => {
                    removed += live.len();
                    self.chunks.pop_front();
                    self.offset = 0;
                }
            }
        }
        self.len -= removed;
        removed
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl FromIterator<Sample> for Segment {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut segment = Self::new();
        for sample in iter {
            segment.push(sample);
        }
        segment
    }
}

/// Per-path ordered list of segments
pub type PathRanges = HashMap<PathKey, Arc<Vec<Segment>>>;

/// Running min/max tracker used for series y-bounds
#[derive(Debug, Clone)]
pub struct IncrementalStats {
    /// Current count of values
    pub count: u64,
    /// Current minimum value
    pub min: f64,
    /// Current maximum value
    pub max: f64,
}

impl Default for IncrementalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalStats {
    /// Create a new empty stats tracker
    pub fn new() -> Self {
        Self {
            count: 0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Add a new value to the statistics. Non-finite values are ignored.
    #[inline]
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// `(min, max)` once at least one value was seen
    pub fn bounds(&self) -> Option<(f64, f64)> {
        (self.count > 0).then_some((self.min, self.max))
    }
}
