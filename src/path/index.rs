//! Topic index over the configured paths.
//!
//! Maps each parseable path to its topic and each topic to the paths that
//! read from it. The set of topics is the subscription set requested from the
//! data sources; the per-topic lists drive live-event dispatch and block
//! extraction.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::{ParsedPath, PathEvaluator};
use crate::types::{PathKey, PlotPath};

/// Topic → paths mapping for one path configuration
#[derive(Debug, Default)]
pub struct PathIndex {
    /// Paths per topic, in configuration order, without duplicates
    by_topic: HashMap<String, Vec<PathKey>>,
    /// Parsed form of every indexed path
    parsed: HashMap<PathKey, ParsedPath>,
}

impl PathIndex {
    /// Build an index. Paths that fail to parse are left out.
    pub fn build<'a>(
        paths: impl IntoIterator<Item = &'a PlotPath>,
        evaluator: &dyn PathEvaluator,
    ) -> Self {
        let mut index = Self::default();
        for path in paths {
            let key = path.key();
            if index.parsed.contains_key(&key) {
                continue;
            }
            let Some(parsed) = evaluator.parse(&path.value) else {
                tracing::trace!("Skipping unparseable path {:?}", path.value);
                continue;
            };
            index
                .by_topic
                .entry(parsed.topic_name.clone())
                .or_default()
                .push(key.clone());
            index.parsed.insert(key, parsed);
        }
        index
    }

    /// Paths reading from `topic`, in configuration order
    pub fn paths_for_topic(&self, topic: &str) -> &[PathKey] {
        self.by_topic.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parsed form of an indexed path
    pub fn parsed(&self, key: &str) -> Option<&ParsedPath> {
        self.parsed.get(key)
    }

    /// Distinct subscribed topics, sorted
    pub fn topics(&self) -> BTreeSet<&str> {
        self.by_topic.keys().map(String::as_str).collect()
    }

    /// `(topic, paths)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathKey])> {
        self.by_topic
            .iter()
            .map(|(topic, keys)| (topic.as_str(), keys.as_slice()))
    }

    /// Every indexed path, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &PathKey> {
        self.parsed.keys()
    }

    /// Whether a path made it into the index
    pub fn contains(&self, key: &str) -> bool {
        self.parsed.contains_key(key)
    }

    pub fn path_count(&self) -> usize {
        self.parsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }
}

/// Rebuilds the index only when the path expressions actually change.
///
/// Hosts hand over a fresh path list on every configuration update, often
/// with only display fields (color, label) touched. Comparing the expressions
/// avoids rebuilding the index, and resetting everything downstream, for
/// those.
#[derive(Debug, Default)]
pub struct PathIndexCache {
    expressions: Option<Vec<String>>,
    index: Arc<PathIndex>,
}

impl PathIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index for `paths`, rebuilding if the expressions differ from
    /// the last call. The flag is `true` when a rebuild happened.
    pub fn get_or_build(
        &mut self,
        paths: &[&PlotPath],
        evaluator: &dyn PathEvaluator,
    ) -> (Arc<PathIndex>, bool) {
        let unchanged = self.expressions.as_ref().is_some_and(|prev| {
            prev.len() == paths.len() && prev.iter().zip(paths).all(|(a, b)| *a == b.value)
        });
        if unchanged {
            return (Arc::clone(&self.index), false);
        }

        let index = Arc::new(PathIndex::build(paths.iter().copied(), evaluator));
        tracing::debug!(
            "Rebuilt path index: {} paths across {} topics",
            index.path_count(),
            index.by_topic.len()
        );
        self.expressions = Some(paths.iter().map(|p| p.value.clone()).collect());
        self.index = Arc::clone(&index);
        (index, true)
    }
}
