//! Configuration module for plotdata-rs
//!
//! A [`PlotConfig`] describes one plot panel: the series to draw, how the
//! x-axis is built, the trailing-window width and which topics the block
//! source preloads. It is the only input the pipeline takes from the user.
//!
//! # Files
//!
//! Configs are stored as TOML (`.toml`) or JSON (anything else):
//!
//! ```toml
//! x_axis_mode = "timestamp"
//! following_view_width = "30"
//! preload = "all"
//!
//! [[paths]]
//! value = "/imu.linear_acceleration.x"
//! timestamp_method = "headerStamp"
//! ```
//!
//! # Following width
//!
//! The trailing-window width is kept as the user typed it. Anything that does
//! not parse to a positive, finite number of seconds disables following.

use crate::error::{PlotDataError, Result};
use crate::path::{parse_path, PathIndex};
use crate::types::{PathKey, PlotPath};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Current config file format version
pub const CONFIG_VERSION: u32 = 1;

/// How x values are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum XAxisMode {
    /// Time since the start of the source
    #[default]
    Timestamp,
    /// Element index within the newest message's array value
    Index,
    /// Values of `x_axis_path`, paired with y samples by position
    Custom,
    /// Newest `x_axis_path` array against the newest y array
    CurrentCustom,
}

impl XAxisMode {
    /// Modes that only ever plot the most recent message
    pub fn is_single_message(&self) -> bool {
        matches!(self, XAxisMode::Index | XAxisMode::CurrentCustom)
    }

    /// Modes that read x values from `x_axis_path`
    pub fn uses_x_axis_path(&self) -> bool {
        matches!(self, XAxisMode::Custom | XAxisMode::CurrentCustom)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            XAxisMode::Timestamp => "Timestamp",
            XAxisMode::Index => "Index",
            XAxisMode::Custom => "Custom (accumulated)",
            XAxisMode::CurrentCustom => "Custom (current message)",
        }
    }
}

/// Which topics the block source preloads as history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BlockPreload {
    /// No preloading; all data comes from the live stream
    #[default]
    None,
    /// Every subscribed topic is preloaded
    All,
    /// Only the listed topics are preloaded
    Topics(Vec<String>),
}

impl BlockPreload {
    pub fn covers(&self, topic: &str) -> bool {
        match self {
            BlockPreload::None => false,
            BlockPreload::All => true,
            BlockPreload::Topics(topics) => topics.iter().any(|t| t == topic),
        }
    }
}

/// Configuration for one plot panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Config format version for future compatibility
    #[serde(default = "default_config_version")]
    pub version: u32,

    /// Panel title
    #[serde(default)]
    pub title: Option<String>,

    /// Y-axis series, in drawing order
    #[serde(default)]
    pub paths: Vec<PlotPath>,

    /// How x values are produced
    #[serde(default)]
    pub x_axis_mode: XAxisMode,

    /// Source of x values in the custom modes
    #[serde(default)]
    pub x_axis_path: Option<PlotPath>,

    /// Trailing window width in seconds, as entered
    #[serde(default)]
    pub following_view_width: Option<String>,

    /// Topics served from preloaded blocks
    #[serde(default)]
    pub preload: BlockPreload,

    /// Whether the renderer shows a legend
    #[serde(default = "default_true")]
    pub show_legend: bool,

    /// Fixed y-axis minimum
    #[serde(default)]
    pub min_y_value: Option<f64>,

    /// Fixed y-axis maximum
    #[serde(default)]
    pub max_y_value: Option<f64>,
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_true() -> bool {
    true
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            title: None,
            paths: Vec::new(),
            x_axis_mode: XAxisMode::Timestamp,
            x_axis_path: None,
            following_view_width: None,
            preload: BlockPreload::None,
            show_legend: true,
            min_y_value: None,
            max_y_value: None,
        }
    }
}

impl PlotConfig {
    /// Create a config plotting `paths` against time
    pub fn new(paths: impl IntoIterator<Item = PlotPath>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Set the x-axis mode
    pub fn with_x_axis_mode(mut self, mode: XAxisMode) -> Self {
        self.x_axis_mode = mode;
        self
    }

    /// Set the x-axis path used by the custom modes
    pub fn with_x_axis_path(mut self, path: PlotPath) -> Self {
        self.x_axis_path = Some(path);
        self
    }

    /// Set the trailing window width, as a user-entered string
    pub fn with_following_view_width(mut self, width: impl Into<String>) -> Self {
        self.following_view_width = Some(width.into());
        self
    }

    /// Set which topics are preloaded
    pub fn with_preload(mut self, preload: BlockPreload) -> Self {
        self.preload = preload;
        self
    }

    /// Parsed trailing window width; `None` when following is disabled
    pub fn following_width(&self) -> Option<f64> {
        parse_following_width(self.following_view_width.as_deref())
    }

    pub fn is_single_message_mode(&self) -> bool {
        self.x_axis_mode.is_single_message()
    }

    /// Every path that needs data: the y paths, plus the x path in custom modes
    pub fn indexed_paths(&self) -> Vec<&PlotPath> {
        let mut paths: Vec<&PlotPath> = self.paths.iter().collect();
        if self.x_axis_mode.uses_x_axis_path() {
            paths.extend(self.x_axis_path.as_ref());
        }
        paths
    }

    /// Indexed paths whose topic the block source preloads.
    ///
    /// Empty in single-message modes, where blocks are not used.
    pub fn block_covered_paths(&self, index: &PathIndex) -> HashSet<PathKey> {
        if self.is_single_message_mode() {
            return HashSet::new();
        }
        index
            .iter()
            .filter(|(topic, _)| self.preload.covers(topic))
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Check for settings that cannot produce data
    pub fn validate(&self) -> Result<()> {
        if self.x_axis_mode.uses_x_axis_path() {
            let Some(x_path) = &self.x_axis_path else {
                return Err(PlotDataError::Config(format!(
                    "x-axis mode '{}' requires an x_axis_path",
                    self.x_axis_mode.display_name()
                )));
            };
            if parse_path(&x_path.value).is_none() {
                return Err(PlotDataError::Path {
                    path: x_path.value.clone(),
                    message: "x-axis path does not parse".to_string(),
                });
            }
        }
        if let (Some(min), Some(max)) = (self.min_y_value, self.max_y_value) {
            if min >= max {
                return Err(PlotDataError::Config(format!(
                    "min_y_value ({}) must be below max_y_value ({})",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Load a config file; TOML for `.toml`, JSON otherwise
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlotDataError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        if is_toml(path) {
            toml::from_str(&content).map_err(|e| {
                PlotDataError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        } else {
            serde_json::from_str(&content).map_err(|e| {
                PlotDataError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })
        }
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load plot config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to disk; TOML for `.toml`, pretty JSON otherwise
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PlotDataError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = if is_toml(path) {
            toml::to_string_pretty(self)
                .map_err(|e| PlotDataError::Serialization(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)?
        };

        std::fs::write(path, content).map_err(|e| {
            PlotDataError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

/// Parse a user-entered trailing window width in seconds
pub fn parse_following_width(text: Option<&str>) -> Option<f64> {
    text?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite() && *w > 0.0)
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
