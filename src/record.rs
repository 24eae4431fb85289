//! On-disk record format for a single task.
//!
//! A record file is a sequence of blocks, oldest first:
//!
//! ```text
//! — 2019-06-01 10:20:30 —
//! title: write the thing
//! todo: snooze 2019-07-01
//!
//! free-text comment lines
//!
//! — 2019-06-02 08:00:00 —
//! todo: done
//!
//! ```
//!
//! Blocks are only ever appended; earlier bytes are never rewritten.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone};

/// Opening half of a marker line.
pub const MARKER_PREFIX: &str = "— ";

/// Closing half of a marker line.
pub const MARKER_SUFFIX: &str = " —";

/// Timestamp layout used inside marker lines (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header key recording an alternate (historical) task ID.
pub const ALTERNATE_ID_KEY: &str = "#id";

/// Header state reconstructed from every block of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    pub header: BTreeMap<String, String>,
    pub alternate_ids: Vec<String>,
    pub ctime: String,
    pub mtime: String,
}

/// Whether `line` (without its trailing newline) is a block marker.
pub fn is_marker(line: &[u8]) -> bool {
    let prefix = MARKER_PREFIX.as_bytes();
    let suffix = MARKER_SUFFIX.as_bytes();
    line.len() >= prefix.len() + suffix.len() && line.starts_with(prefix) && line.ends_with(suffix)
}

/// Timestamp carried by a marker line, trimmed.
pub fn marker_timestamp(line: &[u8]) -> Option<String> {
    if !is_marker(line) {
        return None;
    }
    let inner = &line[MARKER_PREFIX.len()..line.len() - MARKER_SUFFIX.len()];
    Some(String::from_utf8_lossy(inner).trim().to_string())
}

/// Format a marker line (with trailing newline) for `now`.
pub fn marker_line<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}{}{}\n",
        MARKER_PREFIX,
        now.format(TIMESTAMP_FORMAT),
        MARKER_SUFFIX
    )
}

/// True when the first line of `data` is a marker line.
pub fn starts_with_marker(data: &[u8]) -> bool {
    let first = match data.iter().position(|&b| b == b'\n') {
        Some(end) => &data[..end],
        None => data,
    };
    is_marker(first)
}

/// Render one block: marker, `key: value` lines in the given order, a blank
/// line, then the comment normalized to end with exactly one blank line.
pub fn render_block<'a, Tz, I>(now: &DateTime<Tz>, entries: I, comment: &[u8]) -> Vec<u8>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut buf = marker_line(now).into_bytes();
    for (key, value) in entries {
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.push(b'\n');
    }
    buf.push(b'\n');
    buf.extend_from_slice(comment);
    if let Some(&last) = comment.last() {
        if last != b'\n' {
            buf.push(b'\n');
        }
        buf.push(b'\n');
    }
    buf
}

/// Replay every block of `data` into the current header state.
///
/// Callers must check [`starts_with_marker`] first; text before the first
/// marker is treated as comment.
pub fn parse(data: &[u8]) -> ParsedRecord {
    let mut record = ParsedRecord::default();
    let mut in_header = false;

    for line in data.split(|&b| b == b'\n') {
        if let Some(ts) = marker_timestamp(line) {
            if record.ctime.is_empty() {
                record.ctime = ts.clone();
            }
            record.mtime = ts;
            in_header = true;
            continue;
        }
        if line.trim_ascii().is_empty() {
            in_header = false;
            continue;
        }
        if !in_header {
            continue;
        }
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            in_header = false;
            continue;
        };
        let key = String::from_utf8_lossy(line[..colon].trim_ascii()).to_lowercase();
        let value = String::from_utf8_lossy(line[colon + 1..].trim_ascii()).to_string();
        apply_entry(&mut record, key, value);
    }

    record
}

fn apply_entry(record: &mut ParsedRecord, key: String, value: String) {
    if key == ALTERNATE_ID_KEY {
        record.alternate_ids.push(value);
        return;
    }
    if key.starts_with('#') {
        return;
    }
    if value.is_empty() {
        record.header.remove(&key);
    } else {
        record.header.insert(key, value);
    }
}

/// Split a record body into its blocks, oldest first. Each slice keeps its
/// own trailing newline so concatenating the result yields `body` again.
pub fn split_blocks(body: &[u8]) -> Vec<&[u8]> {
    let boundary = format!("\n{MARKER_PREFIX}");
    let boundary = boundary.as_bytes();

    let mut blocks = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + boundary.len() <= body.len() {
        if &body[i..i + boundary.len()] == boundary {
            blocks.push(&body[start..=i]);
            start = i + 1;
        }
        i += 1;
    }
    blocks.push(&body[start..]);
    blocks
}
