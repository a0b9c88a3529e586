//! Recovery-oriented parsing of generative output into a JSON object.

use serde_json::{Map, Value};
use tracing::warn;

pub type StructuredRecord = Map<String, Value>;

const LOGGED_RAW_CHARS: usize = 200;

/// Finds balanced substrings for one pair of nesting delimiters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalancedScanner {
    open: char,
    close: char,
    quote_aware: bool,
}

impl BalancedScanner {
    pub const fn new(open: char, close: char) -> Self {
        Self { open, close, quote_aware: false }
    }

    /// Scanner for JSON objects; ignores braces inside string literals.
    pub const fn json_object() -> Self {
        Self { open: '{', close: '}', quote_aware: true }
    }

    pub const fn quote_aware(mut self, enabled: bool) -> Self {
        self.quote_aware = enabled;
        self
    }

    /// Span starting at byte offset `start` (which must hold the opening
    /// delimiter) up to and including its matching close.
    pub fn span_at<'a>(&self, text: &'a str, start: usize) -> Option<&'a str> {
        let tail = text.get(start..)?;
        if !tail.starts_with(self.open) {
            return None;
        }

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, character) in tail.char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if character == '\\' {
                    escaped = true;
                } else if character == '"' {
                    in_string = false;
                }
                continue;
            }

            if self.quote_aware && character == '"' {
                in_string = true;
            } else if character == self.open {
                depth += 1;
            } else if character == self.close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = offset + character.len_utf8();
                    return Some(&tail[..end]);
                }
            }
        }
        None
    }

    pub fn first_span<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = text.find(self.open)?;
        self.span_at(text, start)
    }

    /// Every balanced span, one per opening delimiter, in order of start.
    pub fn spans<'a>(&self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let scanner = *self;
        text.char_indices()
            .filter(move |(_, character)| *character == scanner.open)
            .filter_map(move |(start, _)| scanner.span_at(text, start))
    }
}

/// Returns the body of the first fenced code block (language tag dropped),
/// or the trimmed input when there is none. An unterminated fence yields
/// everything after it.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[open + 3..];
    let body_start = match after_fence.find('\n') {
        Some(newline) if !after_fence[..newline].trim_start().starts_with('{') => newline + 1,
        _ => 0,
    };
    let body = &after_fence[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

fn parse_object(candidate: &str) -> Option<StructuredRecord> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Tries, in order: the fence-stripped text, the first balanced object, then
/// every balanced object. Logs and returns an empty record when nothing
/// parses.
pub fn coerce(raw: &str) -> StructuredRecord {
    let scanner = BalancedScanner::json_object();
    let stripped = strip_code_fence(raw);

    let recovered = parse_object(stripped)
        .or_else(|| scanner.first_span(stripped).and_then(parse_object))
        .or_else(|| scanner.spans(raw).find_map(parse_object));

    match recovered {
        Some(record) => record,
        None => {
            let preview = raw.chars().take(LOGGED_RAW_CHARS).collect::<String>();
            warn!(
                event_name = "coercion.unparsable",
                raw_len = raw.len(),
                raw = %preview,
                "generative output could not be coerced into a structured record"
            );
            StructuredRecord::new()
        }
    }
}
