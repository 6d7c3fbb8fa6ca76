//! Renderer and channel helpers

use crossbeam_channel::{bounded, Receiver, Sender};
use plotdata_rs::{PlotDataset, PlotPublication, PlotRenderer};

/// Create test channels with default size
pub fn create_test_channel<T>() -> (Sender<T>, Receiver<T>) {
    bounded(16)
}

/// Renderer that records every frame it is given
#[derive(Default)]
pub struct RecordingRenderer {
    pub frames: Vec<(PlotPublication, Vec<PlotDataset>)>,
}

impl RecordingRenderer {
    pub fn last(&self) -> &(PlotPublication, Vec<PlotDataset>) {
        self.frames.last().expect("no frame rendered")
    }
}

impl PlotRenderer for RecordingRenderer {
    fn render(&mut self, publication: &PlotPublication, datasets: &[PlotDataset]) {
        self.frames.push((publication.clone(), datasets.to_vec()));
    }
}
