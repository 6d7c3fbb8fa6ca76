//! Built-in path evaluator over `serde_json::Value` messages.

use serde_json::Value;

use super::{parser, Accessor, Literal, ParsedPath, PathEvaluator};
use crate::types::Time;

/// Evaluates message paths against JSON-shaped messages.
///
/// Slices and filters over arrays fan out: every following accessor is
/// applied to each selected element and the result is an array. Elements
/// missing a field are dropped rather than failing the whole path.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPathEvaluator;

impl JsonPathEvaluator {
    pub fn new() -> Self {
        Self
    }
}

enum Selection<'a> {
    One(&'a Value),
    Many(Vec<&'a Value>),
}

impl PathEvaluator for JsonPathEvaluator {
    fn parse(&self, path: &str) -> Option<ParsedPath> {
        parser::parse_path(path)
    }

    fn evaluate(&self, path: &ParsedPath, message: &Value) -> Option<Value> {
        let mut selection = Selection::One(message);
        for accessor in &path.accessors {
            selection = match selection {
                Selection::One(value) => apply_one(accessor, value)?,
                Selection::Many(values) => {
                    let mut next = Vec::with_capacity(values.len());
                    for value in values {
                        match apply_one(accessor, value) {
                            Some(Selection::One(v)) => next.push(v),
                            Some(Selection::Many(vs)) => next.extend(vs),
                            None => {}
                        }
                    }
                    Selection::Many(next)
                }
            };
        }
        match selection {
            Selection::One(value) => Some(value.clone()),
            Selection::Many(values) if values.is_empty() => None,
            Selection::Many(values) => Some(Value::Array(values.into_iter().cloned().collect())),
        }
    }

    fn header_time(&self, message: &Value) -> Option<Time> {
        let stamp = message.get("header")?.get("stamp")?;
        let sec = ["sec", "secs"].iter().find_map(|k| stamp.get(*k)?.as_u64())?;
        let nsec = ["nsec", "nsecs", "nanosec"]
            .iter()
            .find_map(|k| stamp.get(*k)?.as_u64())
            .unwrap_or(0);
        Some(Time::new(
            u32::try_from(sec).ok()?,
            u32::try_from(nsec).ok()?,
        ))
    }
}

fn apply_one<'a>(accessor: &Accessor, value: &'a Value) -> Option<Selection<'a>> {
    match accessor {
        Accessor::Field(name) => value.get(name.as_str()).map(Selection::One),
        Accessor::Index(index) => {
            let items = value.as_array()?;
            resolve_index(*index, items.len())
                .and_then(|i| items.get(i))
                .map(Selection::One)
        }
        Accessor::Slice { start, end } => {
            let items = value.as_array()?;
            if items.is_empty() {
                return Some(Selection::Many(Vec::new()));
            }
            let first = start.map_or(Some(0), |s| resolve_index(s, items.len()));
            let last = end.map_or(Some(items.len() - 1), |e| {
                resolve_index(e, items.len()).or_else(|| (e >= 0).then(|| items.len() - 1))
            });
            match (first, last) {
                (Some(first), Some(last)) if first <= last => {
                    Some(Selection::Many(items[first..=last].iter().collect()))
                }
                _ => Some(Selection::Many(Vec::new())),
            }
        }
        Accessor::Filter {
            field,
            value: literal,
        } => match value {
            Value::Array(items) => Some(Selection::Many(
                items
                    .iter()
                    .filter(|item| filter_matches(item, field, literal))
                    .collect(),
            )),
            _ => filter_matches(value, field, literal).then_some(Selection::One(value)),
        },
    }
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let resolved = if index < 0 {
        len as i64 + index
    } else {
        index
    };
    (0..len as i64)
        .contains(&resolved)
        .then_some(resolved as usize)
}

fn filter_matches(value: &Value, field: &[String], literal: &Literal) -> bool {
    let Some(target) = field
        .iter()
        .try_fold(value, |v, name| v.get(name.as_str()))
    else {
        return false;
    };
    match (target, literal) {
        (Value::Number(n), Literal::Number(expected)) => n.as_f64() == Some(*expected),
        (Value::String(s), Literal::String(expected)) => s == expected,
        (Value::Bool(b), Literal::Bool(expected)) => b == expected,
        _ => false,
    }
}
