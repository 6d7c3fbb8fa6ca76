//! Plot data replay tool
//!
//! Replays a JSON-lines recording through a plot panel and prints what a
//! renderer would draw.
//!
//! ```text
//! plotdata-replay <config.toml|config.json> <recording.jsonl> [batch-size]
//! ```
//!
//! Topics the config preloads are delivered as one-second blocks, revealed
//! one at a time; everything else is delivered as live batches.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context};
use crossbeam_channel::{bounded, Sender};
use plotdata_rs::{
    error::PlotDataError,
    source::{read_recording, split_into_blocks},
    Block, HostEvent, JsonPathEvaluator, MessageEvent, PlaybackClock, PlotConfig, PlotDataset,
    PlotPanel, PlotPublication, PlotRenderer, Time,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_BATCH_SIZE: usize = 50;
const BLOCK_WIDTH_SECS: f64 = 1.0;

/// Keeps the latest frame and prints it at the end
#[derive(Default)]
struct SummaryRenderer {
    frames: usize,
    last: Option<(PlotPublication, Vec<PlotDataset>)>,
}

impl PlotRenderer for SummaryRenderer {
    fn render(&mut self, publication: &PlotPublication, datasets: &[PlotDataset]) {
        self.frames += 1;
        self.last = Some((publication.clone(), datasets.to_vec()));
    }
}

impl SummaryRenderer {
    fn print(&self, start: Time) {
        println!("Rendered {} frames", self.frames);
        let Some((publication, datasets)) = &self.last else {
            println!("No data published");
            return;
        };
        if let Some(start) = start.to_datetime() {
            println!("Recording start: {}", start.format("%Y-%m-%d %H:%M:%S%.3f UTC"));
        }
        if let Some(window) = publication.view_window {
            println!(
                "View window: {:?} -> {:?}",
                window,
                window.bounds(publication.current_time_since_start)
            );
        }
        for dataset in datasets {
            let bounds = dataset
                .y_bounds
                .map(|(min, max)| format!("[{:.3}, {:.3}]", min, max))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<40} {:>7} points in {} runs, y {} ({})",
                dataset.label,
                dataset.point_count(),
                dataset.runs.len(),
                bounds,
                dataset.style.display_name()
            );
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,plotdata_rs=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("usage: plotdata-replay <config> <recording.jsonl> [batch-size]");
    }
    let batch_size = match args.get(3) {
        Some(text) => text
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .with_context(|| format!("invalid batch size '{}'", text))?,
        None => DEFAULT_BATCH_SIZE,
    };

    let config = PlotConfig::load(&args[1]).context("loading plot config")?;
    config.validate()?;
    let file = File::open(&args[2]).with_context(|| format!("opening {}", args[2]))?;
    let mut events = read_recording(BufReader::new(file))?;
    events.sort_by_key(|e| e.receive_time);

    let (Some(start), Some(end)) = (
        events.first().map(|e| e.receive_time),
        events.last().map(|e| e.receive_time),
    ) else {
        bail!("recording {} has no events", args[2]);
    };
    tracing::info!(
        "Replaying {} events from {} to {} ({:.1}s)",
        events.len(),
        start,
        end,
        end.seconds_since(start)
    );

    let mut panel = PlotPanel::new(Arc::new(JsonPathEvaluator::new()), config);
    let subscriptions = panel.subscriptions();
    for sub in &subscriptions {
        tracing::info!("Subscribed to {} (preloaded: {})", sub.topic, sub.preloaded);
    }

    let (preloaded, live): (Vec<MessageEvent>, Vec<MessageEvent>) = events
        .into_iter()
        .filter(|e| subscriptions.iter().any(|s| s.topic == e.topic))
        .partition(|e| {
            subscriptions
                .iter()
                .any(|s| s.preloaded && s.topic == e.topic)
        });
    let blocks = split_into_blocks(&preloaded, start, BLOCK_WIDTH_SECS);

    let (tx, rx) = bounded::<HostEvent>(16);
    let producer = thread::spawn(move || produce(tx, blocks, live, batch_size, start, end));

    let mut renderer = SummaryRenderer::default();
    plotdata_rs::run_event_loop(&mut panel, &rx, &mut renderer);

    match producer.join() {
        Ok(result) => result?,
        Err(_) => bail!("producer thread panicked"),
    }
    renderer.print(start);
    Ok(())
}

/// Feed the panel: blocks are revealed first, then live batches with a clock
/// tick after each one.
fn produce(
    tx: Sender<HostEvent>,
    blocks: Vec<Block>,
    live: Vec<MessageEvent>,
    batch_size: usize,
    start: Time,
    end: Time,
) -> plotdata_rs::Result<()> {
    let send = |event: HostEvent| {
        tx.send(event)
            .map_err(|e| PlotDataError::Channel(e.to_string()))
    };

    let mut delivered: Vec<Option<Block>> = vec![None; blocks.len()];
    for (idx, block) in blocks.into_iter().enumerate() {
        delivered[idx] = Some(block);
        send(HostEvent::Blocks(delivered.clone()))?;
    }
    send(HostEvent::Clock(PlaybackClock::new(start, start, end)))?;

    for batch in live.chunks(batch_size) {
        let current = batch.last().map_or(start, |e| e.receive_time);
        send(HostEvent::LiveBatch(batch.to_vec()))?;
        send(HostEvent::Clock(PlaybackClock::new(start, current, end)))?;
    }
    Ok(())
}
