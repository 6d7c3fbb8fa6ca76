//! # plotdata-rs: time-series plot data pipeline
//!
//! Turns messages from a robotics-style data source into per-path sample
//! ranges ready for plotting. Data arrives two ways:
//!
//! - **Blocks**: preloaded, immutable chunks of historical messages, delivered
//!   as a growing ordered sequence with possible gaps
//! - **Live events**: batches of messages as playback or a live connection
//!   produces them
//!
//! ## Architecture
//!
//! - **Path index** ([`path`]): parses configured message-path expressions and
//!   groups them by topic
//! - **Block accumulator** ([`blocks`]): memoized per-block extraction, merged
//!   into contiguous segments
//! - **Streaming reducer** ([`stream`]): copy-on-write live view with
//!   following-window trimming
//! - **View window** ([`view`]): which x-range to show
//! - **Merge & publish** ([`merge`], [`dataset`], [`panel`]): combines both
//!   views and hands them to a [`PlotRenderer`]
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use plotdata_rs::{JsonPathEvaluator, PlotConfig, PlotPanel, PlotPath};
//!
//! let config = PlotConfig::new([PlotPath::new("/odom.pose.position.x")]);
//! let mut panel = PlotPanel::new(Arc::new(JsonPathEvaluator::new()), config);
//!
//! panel.on_live_events(&events);
//! panel.publish(&clock, &mut renderer);
//! ```

pub mod blocks;
pub mod config;
pub mod dataset;
pub mod error;
pub mod merge;
pub mod panel;
pub mod path;
pub mod source;
pub mod stream;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use blocks::{BlockAccumulator, BlockCache};
pub use config::{BlockPreload, PlotConfig, XAxisMode};
pub use dataset::{build_datasets, PlotDataset};
pub use error::{PlotDataError, Result};
pub use merge::{merge, PlotPublication, PlotRenderer};
pub use panel::{run_event_loop, HostEvent, PlotPanel, Subscription};
pub use path::{JsonPathEvaluator, PathEvaluator, PathIndex};
pub use source::{Block, BlockData, MessageEvent, PlaybackClock};
pub use stream::{ChangeResult, StreamingReducer};
pub use types::{PathKey, PathRanges, PlotPath, Sample, Segment, Time, TimestampMethod};
pub use view::{compute_view_window, ViewWindow};
