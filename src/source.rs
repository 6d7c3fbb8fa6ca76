//! Contracts for the data sources feeding the pipeline.
//!
//! Two independent sources deliver messages:
//!
//! - **Blocks**: the preloaded history, split into fixed slices of recorded
//!   time and delivered as an ordered, growing sequence of slots.
//! - **Live events**: batches of `(topic, receive time, message)` in arrival
//!   order.
//!
//! Blocks are immutable once delivered and are shared by reference count, so
//! a block's identity (its `Arc` allocation) is stable for as long as the
//! source retains it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;

use crate::error::{PlotDataError, Result, ResultExt};
use crate::types::Time;

/// Message payload as produced by the transport layer
pub type Message = Arc<serde_json::Value>;

/// One message delivered on a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub topic: String,
    pub receive_time: Time,
    pub message: Message,
}

impl MessageEvent {
    pub fn new(topic: impl Into<String>, receive_time: Time, message: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            receive_time,
            message: Arc::new(message),
        }
    }
}

/// Contents of one block of preloaded history
#[derive(Debug, Default)]
pub struct BlockData {
    messages_by_topic: HashMap<String, Vec<MessageEvent>>,
}

impl BlockData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group events by topic, keeping delivery order within each topic
    pub fn from_events(events: impl IntoIterator<Item = MessageEvent>) -> Self {
        let mut data = Self::new();
        for event in events {
            data.messages_by_topic
                .entry(event.topic.clone())
                .or_default()
                .push(event);
        }
        data
    }

    /// Events on `topic`, in time order
    pub fn messages(&self, topic: &str) -> &[MessageEvent] {
        self.messages_by_topic
            .get(topic)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.messages_by_topic.keys().map(String::as_str)
    }

    pub fn message_count(&self) -> usize {
        self.messages_by_topic.values().map(Vec::len).sum()
    }

    /// Freeze into a shareable block
    pub fn into_block(self) -> Block {
        Arc::new(self)
    }
}

/// Shared, immutable block handle. Identity is the `Arc` allocation.
pub type Block = Arc<BlockData>;

/// Playback position as reported by the player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackClock {
    pub start_time: Option<Time>,
    pub current_time: Option<Time>,
    pub end_time: Option<Time>,
}

impl PlaybackClock {
    pub fn new(start_time: Time, current_time: Time, end_time: Time) -> Self {
        Self {
            start_time: Some(start_time),
            current_time: Some(current_time),
            end_time: Some(end_time),
        }
    }

    /// Live sources have a start and a moving current time but no end
    pub fn live(start_time: Time, current_time: Time) -> Self {
        Self {
            start_time: Some(start_time),
            current_time: Some(current_time),
            end_time: None,
        }
    }
}

/// Read a JSON-lines recording, one [`MessageEvent`] object per line.
///
/// ```text
/// {"topic": "/odom", "receive_time": {"sec": 12, "nsec": 0}, "message": {"x": 1.5}}
/// ```
///
/// Blank lines are skipped.
pub fn read_recording(reader: impl BufRead) -> Result<Vec<MessageEvent>> {
    let mut events = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line
            .map_err(PlotDataError::from)
            .with_context(|| format!("reading recording line {}", number + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: MessageEvent =
            serde_json::from_str(&line).map_err(|e| PlotDataError::Recording {
                line: number + 1,
                message: e.to_string(),
            })?;
        events.push(event);
    }
    tracing::debug!("Read {} recorded events", events.len());
    Ok(events)
}

/// Slice events into blocks covering `width_secs` of receive time each,
/// starting at `start`.
///
/// Spans with no events still get an (empty) block, so the sequence has no
/// holes.
pub fn split_into_blocks(events: &[MessageEvent], start: Time, width_secs: f64) -> Vec<Block> {
    if events.is_empty() || !(width_secs.is_finite() && width_secs > 0.0) {
        return Vec::new();
    }
    let mut slots: Vec<Vec<MessageEvent>> = Vec::new();
    for event in events {
        let offset = event.receive_time.seconds_since(start).max(0.0);
        let slot = (offset / width_secs) as usize;
        if slots.len() <= slot {
            slots.resize_with(slot + 1, Vec::new);
        }
        slots[slot].push(event.clone());
    }
    slots
        .into_iter()
        .map(|events| BlockData::from_events(events).into_block())
        .collect()
}
