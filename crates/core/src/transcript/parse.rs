//! Transcriber output parsing.
//!
//! Accepted shapes:
//! - a JSON array of `{start, text}` (or `{start, speech}`) objects
//! - a JSON object with a `segments` array of the same
//! - anything else non-empty, taken as one segment starting at 0

use serde_json::Value;

use super::TranscriptError;
use crate::catalog::TranscriptSegment;

pub fn parse_transcript(output: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(TranscriptError::Empty);
    }

    let segments = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => parse_segments(&items),
        Ok(Value::Object(map)) => match map.get("segments") {
            Some(Value::Array(items)) => parse_segments(items),
            _ => plain_text(trimmed),
        },
        _ => plain_text(trimmed),
    };

    if segments.is_empty() {
        return Err(TranscriptError::Empty);
    }
    Ok(segments)
}

fn plain_text(text: &str) -> Vec<TranscriptSegment> {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    vec![TranscriptSegment {
        start: 0.0,
        text: joined,
    }]
}

fn parse_segments(items: &[Value]) -> Vec<TranscriptSegment> {
    let mut segments: Vec<TranscriptSegment> = items
        .iter()
        .filter_map(|item| {
            let text = item
                .get("text")
                .or_else(|| item.get("speech"))
                .and_then(Value::as_str)?
                .trim();
            if text.is_empty() {
                return None;
            }
            let start = item.get("start").and_then(parse_offset).unwrap_or(0.0);
            Some(TranscriptSegment {
                start,
                text: text.to_string(),
            })
        })
        .collect();

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
}

/// Seconds from a number or an `HH:MM:SS.mmm` / `MM:SS.mmm` timestamp.
fn parse_offset(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
        Value::String(s) => parse_timestamp(s),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim().replace(',', ".");
    let mut total = 0.0;
    for part in s.split(':') {
        let value: f64 = part.parse().ok()?;
        total = total * 60.0 + value;
    }
    Some(total).filter(|v: &f64| v.is_finite() && *v >= 0.0)
}
