//! Plot panel: wires the pipeline stages together for one plot.
//!
//! The host drives a panel through a handful of calls, always from a single
//! thread:
//!
//! ```text
//! set_config ──► PathIndexCache ──► BlockAccumulator / StreamingReducer
//! on_blocks ───► BlockAccumulator ─┐
//! on_live_events ► StreamingReducer ┼─► merge ─► build_datasets ─► PlotRenderer
//! publish(clock) ──► view window ──┘
//! ```
//!
//! Hosts that deliver input over a channel can hand the receiving end to
//! [`run_event_loop`], which drains [`HostEvent`]s in order.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::blocks::BlockAccumulator;
use crate::config::PlotConfig;
use crate::dataset::{build_datasets, PlotDataset};
use crate::merge::{merge, PlotPublication, PlotRenderer};
use crate::path::{PathEvaluator, PathIndex, PathIndexCache};
use crate::source::{Block, MessageEvent, PlaybackClock};
use crate::stream::{ChangeResult, StreamingReducer};
use crate::types::{PathRanges, Time};
use crate::view::{compute_view_window, current_time_since_start};

/// A topic the panel needs, and whether the block source should preload it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Subscription {
    pub topic: String,
    pub preloaded: bool,
}

/// Input delivered to a panel by its host
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Replace the plot configuration
    Config(Box<PlotConfig>),
    /// Latest full block sequence from the block source
    Blocks(Vec<Option<Block>>),
    /// Live events, in delivery order
    LiveBatch(Vec<MessageEvent>),
    /// Source restarted or seeked; drop all data
    Reset,
    /// Playback clock tick; triggers a publication
    Clock(PlaybackClock),
}

/// Merged output, reused while neither view changes
#[derive(Debug)]
struct MergedCache {
    merged: Arc<PathRanges>,
    start_time: Option<Time>,
    datasets: Vec<PlotDataset>,
}

/// One plot's data pipeline
pub struct PlotPanel {
    config: PlotConfig,
    evaluator: Arc<dyn PathEvaluator>,
    index_cache: PathIndexCache,
    index: Arc<PathIndex>,
    accumulator: BlockAccumulator,
    reducer: StreamingReducer,
    blocks: Vec<Option<Block>>,
    dirty: bool,
    merged: Option<MergedCache>,
    last_publication: Option<PlotPublication>,
}

impl PlotPanel {
    pub fn new(evaluator: Arc<dyn PathEvaluator>, config: PlotConfig) -> Self {
        let mut panel = Self {
            config: PlotConfig::default(),
            accumulator: BlockAccumulator::new(Arc::clone(&evaluator)),
            reducer: StreamingReducer::new(Arc::clone(&evaluator)),
            evaluator,
            index_cache: PathIndexCache::new(),
            index: Arc::new(PathIndex::default()),
            blocks: Vec::new(),
            dirty: true,
            merged: None,
            last_publication: None,
        };
        panel.set_config(config);
        panel
    }

    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<PathIndex> {
        &self.index
    }

    /// Apply a new configuration.
    ///
    /// Data survives when only display fields change. A change to the path
    /// expressions rebuilds the index, drops block data and keeps live data
    /// for paths that are still configured. A change to the preload set
    /// re-extracts blocks for the newly covered paths.
    pub fn set_config(&mut self, config: PlotConfig) {
        if let Err(e) = config.validate() {
            tracing::warn!("Plot config is incomplete: {}", e);
        }

        let (index, rebuilt) = self
            .index_cache
            .get_or_build(&config.indexed_paths(), &*self.evaluator);
        let single = config.is_single_message_mode();
        let covered = config.block_covered_paths(&index);

        if rebuilt {
            self.reducer.restore(Arc::clone(&index));
            self.accumulator.set_index(Arc::clone(&index));
        }
        self.reducer.set_single_message_mode(single);
        self.reducer.set_following_width(config.following_width());
        self.accumulator.set_single_message_mode(single);
        self.accumulator.set_block_covered(covered.clone());
        self.reducer.set_block_covered(covered);
        // No-op walk unless the index, mode or coverage changed
        self.accumulator.accumulate(&self.blocks);

        tracing::debug!(
            "Plot config applied: {} paths, x-axis {}, following {:?}",
            index.path_count(),
            config.x_axis_mode.display_name(),
            config.following_width()
        );
        self.index = index;
        self.config = config;
        self.dirty = true;
    }

    /// Topics to subscribe to, sorted by name
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let single = self.config.is_single_message_mode();
        self.index
            .topics()
            .into_iter()
            .map(|topic| Subscription {
                topic: topic.to_string(),
                preloaded: !single && self.config.preload.covers(topic),
            })
            .collect()
    }

    /// Receive the block source's current sequence
    pub fn on_blocks(&mut self, blocks: Vec<Option<Block>>) {
        self.blocks = blocks;
        self.accumulator.accumulate(&self.blocks);
        self.dirty = true;
    }

    /// Apply a batch of live events
    pub fn on_live_events(&mut self, events: &[MessageEvent]) -> ChangeResult {
        let result = self.reducer.apply(events);
        self.dirty |= result.changed;
        result
    }

    /// Drop all data, keeping the configuration
    pub fn on_reset(&mut self) {
        tracing::debug!("Resetting plot data");
        self.blocks.clear();
        self.accumulator.reset();
        self.reducer.reset();
        self.dirty = true;
    }

    /// Merge both views and hand them to `renderer`
    pub fn publish(&mut self, clock: &PlaybackClock, renderer: &mut dyn PlotRenderer) {
        let stale = self.dirty
            || self
                .merged
                .as_ref()
                .map_or(true, |cache| cache.start_time != clock.start_time);

        if stale {
            let merged = match self.merged.take() {
                Some(cache) if !self.dirty => cache.merged,
                _ => Arc::new(merge(self.accumulator.ranges(), self.reducer.ranges())),
            };
            let datasets = build_datasets(&self.config, &self.index, &merged, clock.start_time);
            self.merged = Some(MergedCache {
                merged,
                start_time: clock.start_time,
                datasets,
            });
            self.dirty = false;
        }

        let Some(cache) = &self.merged else {
            return;
        };
        let mode = self.config.x_axis_mode;
        let publication = PlotPublication {
            paths: self.config.paths.clone(),
            merged: Arc::clone(&cache.merged),
            view_window: compute_view_window(mode, self.config.following_width(), clock),
            current_time_since_start: current_time_since_start(mode, clock),
        };
        renderer.render(&publication, &cache.datasets);
        self.last_publication = Some(publication);
    }

    /// The most recent publication, if any
    pub fn last_publication(&self) -> Option<&PlotPublication> {
        self.last_publication.as_ref()
    }

    /// Handle one host event
    pub fn handle(&mut self, event: HostEvent, renderer: &mut dyn PlotRenderer) {
        match event {
            HostEvent::Config(config) => self.set_config(*config),
            HostEvent::Blocks(blocks) => self.on_blocks(blocks),
            HostEvent::LiveBatch(events) => {
                self.on_live_events(&events);
            }
            HostEvent::Reset => self.on_reset(),
            HostEvent::Clock(clock) => self.publish(&clock, renderer),
        }
    }
}

impl std::fmt::Debug for PlotPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlotPanel")
            .field("paths", &self.config.paths.len())
            .field("blocks", &self.blocks.len())
            .field("accumulator", &self.accumulator)
            .field("reducer", &self.reducer)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Drain `receiver` until every sender is dropped, one event at a time.
///
/// Returns the number of events handled.
pub fn run_event_loop(
    panel: &mut PlotPanel,
    receiver: &Receiver<HostEvent>,
    renderer: &mut dyn PlotRenderer,
) -> usize {
    let mut handled = 0;
    for event in receiver.iter() {
        panel.handle(event, renderer);
        handled += 1;
    }
    tracing::info!("Event loop finished after {} events", handled);
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlockPreload, XAxisMode};
    use crate::path::JsonPathEvaluator;
    use crate::source::BlockData;
    use crate::types::PlotPath;
    use crossbeam_channel::unbounded;
    use serde_json::json;

    #[derive(Default)]
    struct CollectingRenderer {
        frames: Vec<(PlotPublication, Vec<PlotDataset>)>,
    }

    impl PlotRenderer for CollectingRenderer {
        fn render(&mut self, publication: &PlotPublication, datasets: &[PlotDataset]) {
            self.frames.push((publication.clone(), datasets.to_vec()));
        }
    }

    fn panel(config: PlotConfig) -> PlotPanel {
        PlotPanel::new(Arc::new(JsonPathEvaluator::new()), config)
    }

    fn event(topic: &str, sec: u32, x: f64) -> MessageEvent {
        MessageEvent::new(topic, Time::new(sec, 0), json!({ "x": x }))
    }

    fn block(topic: &str, secs: &[u32]) -> Option<Block> {
        Some(
            BlockData::from_events(secs.iter().map(|&s| event(topic, s, s as f64))).into_block(),
        )
    }

    fn clock() -> PlaybackClock {
        PlaybackClock::new(Time::new(0, 0), Time::new(5, 0), Time::new(10, 0))
    }

    #[test]
    fn test_subscriptions_mark_preloaded_topics() {
        let config = PlotConfig::new([PlotPath::new("/b.x"), PlotPath::new("/a.x")])
            .with_preload(BlockPreload::Topics(vec!["/a".into()]));
        let panel = panel(config);
        assert_eq!(
            panel.subscriptions(),
            vec![
                Subscription { topic: "/a".into(), preloaded: true },
                Subscription { topic: "/b".into(), preloaded: false },
            ]
        );
    }

    #[test]
    fn test_single_message_mode_never_preloads() {
        let config = PlotConfig::new([PlotPath::new("/a.x")])
            .with_preload(BlockPreload::All)
            .with_x_axis_mode(XAxisMode::Index);
        assert!(panel(config).subscriptions().iter().all(|s| !s.preloaded));
    }

    #[test]
    fn test_publish_merges_block_and_live_data() {
        let config = PlotConfig::new([PlotPath::new("/a.x"), PlotPath::new("/b.x")])
            .with_preload(BlockPreload::Topics(vec!["/a".into()]));
        let mut panel = panel(config);
        let mut renderer = CollectingRenderer::default();

        panel.on_blocks(vec![block("/a", &[1, 2])]);
        // Live data for a block-covered path is ignored
        panel.on_live_events(&[event("/a", 3, 3.0), event("/b", 3, 3.0)]);
        panel.publish(&clock(), &mut renderer);

        let (publication, datasets) = &renderer.frames[0];
        assert_eq!(publication.merged["/a.x"][0].len(), 2);
        assert_eq!(publication.merged["/b.x"][0].len(), 1);
        assert_eq!(publication.current_time_since_start, Some(5.0));
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].runs, vec![vec![[1.0, 1.0], [2.0, 2.0]]]);
    }

    #[test]
    fn test_publish_reuses_merged_output_when_unchanged() {
        let mut panel = panel(PlotConfig::new([PlotPath::new("/a.x")]));
        let mut renderer = CollectingRenderer::default();
        panel.on_live_events(&[event("/a", 1, 1.0)]);
        panel.publish(&clock(), &mut renderer);
        panel.on_live_events(&[event("/other", 2, 2.0)]);
        panel.publish(&clock(), &mut renderer);

        assert_eq!(renderer.frames.len(), 2);
        assert!(Arc::ptr_eq(&renderer.frames[0].0.merged, &renderer.frames[1].0.merged));

        panel.on_live_events(&[event("/a", 2, 2.0)]);
        panel.publish(&clock(), &mut renderer);
        assert!(!Arc::ptr_eq(&renderer.frames[1].0.merged, &renderer.frames[2].0.merged));
    }

    #[test]
    fn test_reset_clears_everything() {
        let config = PlotConfig::new([PlotPath::new("/a.x")]).with_preload(BlockPreload::All);
        let mut panel = panel(config);
        let mut renderer = CollectingRenderer::default();
        panel.on_blocks(vec![block("/a", &[1])]);
        panel.on_reset();
        panel.publish(&clock(), &mut renderer);
        assert!(renderer.frames[0].0.merged.is_empty());
    }

    #[test]
    fn test_config_change_keeps_live_data_for_remaining_paths() {
        let mut panel = panel(PlotConfig::new([PlotPath::new("/a.x"), PlotPath::new("/b.x")]));
        panel.on_live_events(&[event("/a", 1, 1.0), event("/b", 1, 1.0)]);

        panel.set_config(PlotConfig::new([PlotPath::new("/a.x")]));
        let mut renderer = CollectingRenderer::default();
        panel.publish(&clock(), &mut renderer);
        let merged = &renderer.frames[0].0.merged;
        assert!(merged.contains_key("/a.x"));
        assert!(!merged.contains_key("/b.x"));
    }

    #[test]
    fn test_config_change_reaccumulates_blocks() {
        let mut panel = panel(PlotConfig::new([PlotPath::new("/a.x")]).with_preload(BlockPreload::All));
        panel.on_blocks(vec![block("/a", &[1]), block("/b", &[1])]);

        panel.set_config(
            PlotConfig::new([PlotPath::new("/a.x"), PlotPath::new("/b.x")])
                .with_preload(BlockPreload::All),
        );
        let mut renderer = CollectingRenderer::default();
        panel.publish(&clock(), &mut renderer);
        assert_eq!(renderer.frames[0].0.merged.len(), 2);
    }

    #[test]
    fn test_event_loop_drains_in_order() {
        let mut panel = panel(PlotConfig::default());
        let mut renderer = CollectingRenderer::default();
        let (tx, rx) = unbounded();

        tx.send(HostEvent::Config(Box::new(
            PlotConfig::new([PlotPath::new("/a.x")]).with_following_view_width("2"),
        )))
        .unwrap();
        tx.send(HostEvent::LiveBatch((0..=4).map(|t| event("/a", t, t as f64)).collect()))
            .unwrap();
        tx.send(HostEvent::Clock(PlaybackClock::live(Time::new(0, 0), Time::new(4, 0))))
            .unwrap();
        tx.send(HostEvent::Reset).unwrap();
        tx.send(HostEvent::Clock(PlaybackClock::default())).unwrap();
        drop(tx);

        assert_eq!(run_event_loop(&mut panel, &rx, &mut renderer), 5);
        assert_eq!(renderer.frames.len(), 2);

        let (first, datasets) = &renderer.frames[0];
        assert_eq!(
            first.view_window,
            Some(crate::view::ViewWindow::Following { width: 2.0 })
        );
        let xs: Vec<f64> = datasets[0].runs[0].iter().map(|p| p[0]).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        assert!(renderer.frames[1].0.merged.is_empty());
    }

    #[test]
    fn test_blocks_do_not_hide_live_data_for_other_topics() {
        let config = PlotConfig::new([PlotPath::new("/a.x"), PlotPath::new("/b.x")])
            .with_preload(BlockPreload::Topics(vec!["/a".into()]));
        let mut panel = panel(config);
        let mut renderer = CollectingRenderer::default();

        // The block source also recorded /b, which is only subscribed live
        panel.on_blocks(vec![Some(
            BlockData::from_events([event("/a", 1, 1.0), event("/b", 1, 100.0)]).into_block(),
        )]);
        panel.on_live_events(&[event("/b", 2, 2.0), event("/b", 3, 3.0), event("/b", 4, 4.0)]);
        panel.publish(&clock(), &mut renderer);

        let merged = &renderer.frames[0].0.merged;
        let live: Vec<f64> = merged["/b.x"][0].iter().filter_map(|s| s.value.as_f64()).collect();
        assert_eq!(merged["/b.x"].len(), 1);
        assert_eq!(live, vec![2.0, 3.0, 4.0]);
        assert_eq!(merged["/a.x"][0].len(), 1);

        // Preloading /b too moves it over to block data
        panel.set_config(
            PlotConfig::new([PlotPath::new("/a.x"), PlotPath::new("/b.x")])
                .with_preload(BlockPreload::All),
        );
        panel.publish(&clock(), &mut renderer);
        let merged = &renderer.frames[1].0.merged;
        let from_block: Vec<f64> = merged["/b.x"][0].iter().filter_map(|s| s.value.as_f64()).collect();
        assert_eq!(from_block, vec![100.0]);
    }
}
