//! Message paths: parsing, evaluation and the topic index.
//!
//! A message path names a topic and an optional chain of accessors into the
//! message, e.g. `/imu.angular_velocity.z`. The pipeline only depends on the
//! [`PathEvaluator`] trait; [`JsonPathEvaluator`] is the built-in
//! implementation over `serde_json::Value` messages.

mod json;
pub mod index;
pub mod parser;

pub use index::{PathIndex, PathIndexCache};
pub use json::JsonPathEvaluator;
pub use parser::parse_path;

use crate::types::Time;

/// One step into a message
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    /// `.name`
    Field(String),
    /// `[i]`, negative values count from the end
    Index(i64),
    /// `[start:end]`, inclusive on both ends
    Slice {
        start: Option<i64>,
        end: Option<i64>,
    },
    /// `{a.b==literal}`
    Filter { field: Vec<String>, value: Literal },
}

/// Right-hand side of a filter
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
}

/// Post-processing applied when building plot points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Plot the rate of change instead of the value
    Derivative,
}

/// A successfully parsed message path
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPath {
    pub topic_name: String,
    pub accessors: Vec<Accessor>,
    pub modifier: Option<Modifier>,
}

/// Parses and evaluates message paths.
///
/// Implementations must be pure: the same inputs always give the same output.
/// The block cache relies on this.
#[cfg_attr(test, mockall::automock)]
pub trait PathEvaluator {
    /// Parse a path expression; `None` if it is malformed
    fn parse(&self, path: &str) -> Option<ParsedPath>;

    /// Extract the value a parsed path addresses; `None` if absent
    fn evaluate(&self, path: &ParsedPath, message: &serde_json::Value)
        -> Option<serde_json::Value>;

    /// Semantic timestamp carried inside the message, if any
    fn header_time(&self, message: &serde_json::Value) -> Option<Time>;
}
