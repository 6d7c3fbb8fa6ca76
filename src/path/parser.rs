//! Parser for message path expressions.
//!
//! ```text
//! /imu.linear_acceleration.x            field access
//! /scan.ranges[0]                       array index (negative counts from the end)
//! /scan.ranges[2:5]                     inclusive slice, either bound optional
//! /tf.transforms[:]{child_frame_id=="base"}.translation.x
//! /odom.twist.linear.x.@derivative      derivative modifier
//! ```

use super::{Accessor, Literal, Modifier, ParsedPath};

/// Parse a message path. Returns `None` for anything malformed.
pub fn parse_path(input: &str) -> Option<ParsedPath> {
    let mut cursor = Cursor::new(input.trim());
    let topic_name = cursor.topic()?;
    let mut accessors = Vec::new();
    let mut modifier = None;

    while let Some(c) = cursor.peek() {
        if modifier.is_some() {
            // Modifiers must come last
            return None;
        }
        match c {
            '.' => {
                cursor.bump();
                if cursor.eat('@') {
                    modifier = Some(match cursor.identifier()?.as_str() {
                        "derivative" => Modifier::Derivative,
                        _ => return None,
                    });
                } else {
                    accessors.push(Accessor::Field(cursor.identifier()?));
                }
            }
            '[' => {
                cursor.bump();
                let body = cursor.take_until(']')?;
                accessors.push(parse_brackets(body.trim())?);
            }
            '{' => {
                cursor.bump();
                let body = cursor.take_until('}')?;
                accessors.push(parse_filter(body.trim())?);
            }
            _ => return None,
        }
    }

    Some(ParsedPath {
        topic_name,
        accessors,
        modifier,
    })
}

fn parse_brackets(body: &str) -> Option<Accessor> {
    if body.is_empty() {
        return None;
    }
    match body.split_once(':') {
        Some((start, end)) => Some(Accessor::Slice {
            start: parse_bound(start)?,
            end: parse_bound(end)?,
        }),
        None => body.parse::<i64>().ok().map(Accessor::Index),
    }
}

fn parse_bound(text: &str) -> Option<Option<i64>> {
    let text = text.trim();
    if text.is_empty() {
        Some(None)
    } else {
        text.parse::<i64>().ok().map(Some)
    }
}

fn parse_filter(body: &str) -> Option<Accessor> {
    let (lhs, rhs) = body.split_once("==")?;
    let field: Vec<String> = lhs.trim().split('.').map(str::to_string).collect();
    if field.iter().any(|f| !is_identifier(f)) {
        return None;
    }
    Some(Accessor::Filter {
        field,
        value: parse_literal(rhs.trim())?,
    })
}

fn parse_literal(text: &str) -> Option<Literal> {
    let quoted = |q: char| text.len() >= 2 && text.starts_with(q) && text.ends_with(q);
    if quoted('"') || quoted('\'') {
        return Some(Literal::String(text[1..text.len() - 1].to_string()));
    }
    match text {
        "true" => Some(Literal::Bool(true)),
        "false" => Some(Literal::Bool(false)),
        _ => text
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Literal::Number),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// `/name(/name)*`, ending at the first accessor character
    fn topic(&mut self) -> Option<String> {
        if !self.rest().starts_with('/') {
            return None;
        }
        let len = self
            .rest()
            .find(['.', '[', '{'])
            .unwrap_or(self.rest().len());
        let topic = &self.rest()[..len];
        let valid = topic.len() > 1
            && !topic.ends_with('/')
            && topic[1..]
                .split('/')
                .all(|part| !part.is_empty() && part.chars().all(is_topic_char));
        if !valid {
            return None;
        }
        self.pos += len;
        Some(topic.to_string())
    }

    fn identifier(&mut self) -> Option<String> {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        let ident = &self.rest()[..len];
        if !is_identifier(ident) {
            return None;
        }
        self.pos += len;
        Some(ident.to_string())
    }

    /// Consume through `close` and return the text before it
    fn take_until(&mut self, close: char) -> Option<&'a str> {
        let end = self.rest().find(close)?;
        let body = &self.rest()[..end];
        self.pos += end + close.len_utf8();
        Some(body)
    }
}

fn is_topic_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '~'
}
