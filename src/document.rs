//! Editable task documents.
//!
//! A document is a header section (`key: value` lines up to the first blank
//! line) followed by a free-text comment. Anything from the first line that
//! starts with `— ` onwards is history or a bulk manifest and is not part of
//! the comment.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::{Error, Result};
use crate::list::List;
use crate::record::MARKER_PREFIX;
use crate::task::{Header, SystemField, Task};

/// Initial text for a new task.
pub const CREATE_TEMPLATE: &str = "title: \n\n<describe task here>\n\n";

const PLACEHOLDERS: [&str; 2] = ["<optional comment here>", "<describe task here>"];

/// Changes extracted from an edited document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edit {
    /// Header entries that differ from the baseline.
    pub header: Header,
    pub comment: String,
    /// Value of an `id:` line, used when creating.
    pub explicit_id: Option<String>,
}

impl Edit {
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.comment.is_empty()
    }
}

/// Parse `text` against `baseline`. Only header entries whose value differs
/// from the baseline are kept; with no baseline every entry is kept.
///
/// A key repeated in the header section keeps its first value, so a line
/// prepended to a rendered document overrides it. Every line in the header
/// section without a colon is reported in one [`Error::Format`].
pub fn parse(text: &str, baseline: Option<&Header>) -> Result<Edit> {
    let mut edit = Edit::default();
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        offset += raw.len();
        let line = raw.trim();
        if line.is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            errors.push(format!("unknown summary line: {line}"));
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        match SystemField::parse(&key) {
            Some(SystemField::Id) => {
                if !value.is_empty() {
                    edit.explicit_id = Some(value.to_string());
                }
                continue;
            }
            Some(_) => continue,
            None => {}
        }
        if !seen.insert(key.clone()) {
            continue;
        }
        let previous = baseline
            .map(|header| header.get(&key).map(String::as_str).unwrap_or(""));
        if previous != Some(value) {
            edit.header.insert(key, value.to_string());
        }
    }

    if !errors.is_empty() {
        return Err(Error::Format(errors));
    }

    edit.comment = comment_of(&text[offset.min(text.len())..]);
    Ok(edit)
}

fn comment_of(rest: &str) -> String {
    let mut end = rest.len();
    let mut pos = 0;
    for line in rest.split_inclusive('\n') {
        if line.starts_with(MARKER_PREFIX) {
            end = pos;
            break;
        }
        pos += line.len();
    }
    let comment = rest[..end].trim();
    if PLACEHOLDERS.contains(&comment) {
        String::new()
    } else {
        comment.to_string()
    }
}

/// Apply an edited rendering of `task`. Returns `None` when the document is
/// unchanged or carries no changes.
pub fn apply_task_edit(
    list: &List,
    task: &Task,
    original: &str,
    updated: &str,
    now: DateTime<Local>,
) -> Result<Option<Arc<Task>>> {
    if original == updated {
        debug!(id = task.id(), "document unchanged");
        return Ok(None);
    }
    let edit = parse(updated, Some(task.headers()))?;
    if edit.is_empty() {
        debug!(id = task.id(), "no header changes or comment");
        return Ok(None);
    }
    list.write_at(task, now, &edit.header, &edit.comment).map(Some)
}

/// Create a task from a filled-in [`CREATE_TEMPLATE`].
pub fn create_from_document(list: &List, text: &str, now: DateTime<Local>) -> Result<Arc<Task>> {
    let edit = parse(text, None)?;
    list.create_at(edit.explicit_id.as_deref(), now, &edit.header, &edit.comment)
}
