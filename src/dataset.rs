//! Turns merged per-path samples into x/y points for the renderer.
//!
//! | x-axis mode      | x value                                      | data used          |
//! |------------------|----------------------------------------------|--------------------|
//! | `Timestamp`      | sample timestamp − start, seconds            | every segment      |
//! | `Index`          | element index in the newest array value      | newest sample      |
//! | `Custom`         | x-path sample at the same position           | every sample       |
//! | `CurrentCustom`  | newest x-path array, element-wise            | newest sample      |
//!
//! In timestamp mode each segment becomes its own run of points, so gaps in
//! block coverage stay visible.

use serde_json::Value;

use crate::config::{PlotConfig, XAxisMode};
use crate::path::{Modifier, PathIndex};
use crate::types::{IncrementalStats, PathKey, PathRanges, PlotPath, PlotStyle, Sample, Time};

/// Points for one series
#[derive(Debug, Clone, PartialEq)]
pub struct PlotDataset {
    pub key: PathKey,
    pub label: String,
    pub color: [u8; 4],
    pub style: PlotStyle,
    /// Runs of `[x, y]` points; renderers break the line between runs
    pub runs: Vec<Vec<[f64; 2]>>,
    /// `(min, max)` of the y values
    pub y_bounds: Option<(f64, f64)>,
}

impl PlotDataset {
    pub fn point_count(&self) -> usize {
        self.runs.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(Vec::is_empty)
    }
}

/// Numeric form of a value: numbers, booleans and numeric strings
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Numeric elements of a value; scalars yield at most one
fn numeric_values(value: &Value) -> Vec<f64> {
    match value {
        Value::Array(items) => items.iter().filter_map(numeric_value).collect(),
        other => numeric_value(other).into_iter().collect(),
    }
}

/// `[index, value]` for each numeric array element; a scalar sits at index 0
fn indexed_points(value: &Value) -> Vec<[f64; 2]> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| Some([i as f64, numeric_value(item)?]))
            .collect(),
        other => numeric_value(other).map(|y| [0.0, y]).into_iter().collect(),
    }
}

/// Build one dataset per enabled y path, in configuration order.
///
/// `start_time` anchors the timestamp axis; without one, x values are
/// absolute seconds.
pub fn build_datasets(
    config: &PlotConfig,
    index: &PathIndex,
    merged: &PathRanges,
    start_time: Option<Time>,
) -> Vec<PlotDataset> {
    let start = start_time.unwrap_or(Time::ZERO);
    let x_samples = config
        .x_axis_path
        .as_ref()
        .filter(|_| config.x_axis_mode.uses_x_axis_path())
        .and_then(|p| merged.get(p.value.as_str()));

    config
        .paths
        .iter()
        .enumerate()
        .filter(|(_, path)| path.enabled)
        .map(|(position, path)| {
            let key = path.key();
            let segments = merged.get(key.as_str());
            let derivative = index
                .parsed(key.as_str())
                .is_some_and(|p| p.modifier == Some(Modifier::Derivative));

            let runs: Vec<Vec<[f64; 2]>> = match (config.x_axis_mode, segments) {
                (_, None) => Vec::new(),
                (XAxisMode::Timestamp, Some(segments)) => {
                    let per_segment = segments
                        .iter()
                        .map(|seg| timestamp_run(path, seg.iter(), start))
                        .filter(|run| !run.is_empty());
                    if derivative {
                        per_segment.map(|run| derivative_run(&run)).collect()
                    } else {
                        per_segment.collect()
                    }
                }
                (XAxisMode::Index, Some(segments)) => newest(segments)
                    .map(|sample| indexed_points(&sample.value))
                    .into_iter()
                    .collect(),
                (XAxisMode::Custom, Some(segments)) => {
                    let xs = x_samples.map(|s| flatten(s)).unwrap_or_default();
                    let ys = flatten(segments);
                    let run: Vec<[f64; 2]> = xs
                        .iter()
                        .zip(&ys)
                        .filter_map(|(x, y)| {
                            Some([numeric_value(&x.value)?, numeric_value(&y.value)?])
                        })
                        .collect();
                    vec![run]
                }
                (XAxisMode::CurrentCustom, Some(segments)) => {
                    let xs = x_samples
                        .and_then(|s| newest(s))
                        .map(|s| numeric_values(&s.value))
                        .unwrap_or_default();
                    let ys = newest(segments)
                        .map(|s| numeric_values(&s.value))
                        .unwrap_or_default();
                    vec![xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect()]
                }
            };

            let mut stats = IncrementalStats::new();
            for point in runs.iter().flatten() {
                stats.push(point[1]);
            }

            PlotDataset {
                label: path.display_label().to_string(),
                color: path.color_or_auto(position),
                style: path.plot_style,
                key,
                y_bounds: stats.bounds(),
                runs: runs.into_iter().filter(|run| !run.is_empty()).collect(),
            }
        })
        .collect()
}

fn timestamp_run<'a>(
    path: &PlotPath,
    samples: impl Iterator<Item = &'a Sample>,
    start: Time,
) -> Vec<[f64; 2]> {
    let mut run = Vec::new();
    for sample in samples {
        let Some(stamp) = sample.timestamp(path.timestamp_method) else {
            continue;
        };
        let x = stamp.seconds_since(start);
        for y in numeric_values(&sample.value) {
            run.push([x, y]);
        }
    }
    run
}

/// Rate of change between consecutive points; the first point has none
fn derivative_run(run: &[[f64; 2]]) -> Vec<[f64; 2]> {
    run.windows(2)
        .filter_map(|pair| {
            let [x0, y0] = pair[0];
            let [x1, y1] = pair[1];
            let dx = x1 - x0;
            (dx > 0.0).then(|| [x1, (y1 - y0) / dx])
        })
        .collect()
}

fn newest(segments: &[crate::types::Segment]) -> Option<&Sample> {
    segments.iter().rev().find_map(|seg| seg.last())
}

fn flatten(segments: &[crate::types::Segment]) -> Vec<&Sample> {
    segments.iter().flat_map(|seg| seg.iter()).collect()
}
