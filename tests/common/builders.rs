//! Test data builders for messages, blocks and configs

use plotdata_rs::{
    Block, BlockData, BlockPreload, MessageEvent, PlotConfig, PlotPath, Time,
};
use serde_json::json;

/// Builder for a block holding `{ "x": <sec> }` messages on one or more topics
pub struct BlockBuilder {
    events: Vec<MessageEvent>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add one message per second in `secs` on `topic`
    pub fn topic(mut self, topic: &str, secs: &[u32]) -> Self {
        self.events
            .extend(secs.iter().map(|&s| odom_event(topic, s, s as f64)));
        self
    }

    pub fn build(self) -> Block {
        BlockData::from_events(self.events).into_block()
    }
}

/// `{ "x": x, "header": { "stamp": ... } }` with header time one second behind
pub fn odom_event(topic: &str, sec: u32, x: f64) -> MessageEvent {
    MessageEvent::new(
        topic,
        Time::new(sec, 0),
        json!({
            "x": x,
            "header": { "stamp": { "sec": sec.saturating_sub(1), "nsec": 0 } }
        }),
    )
}

/// Config plotting `.x` of each topic, with those topics preloaded
pub fn preloaded_config(topics: &[&str]) -> PlotConfig {
    PlotConfig::new(topics.iter().map(|t| PlotPath::new(format!("{}.x", t)))).with_preload(
        BlockPreload::Topics(topics.iter().map(|t| t.to_string()).collect()),
    )
}
