//! Tasks reconstructed from record files.
//!
//! A task carries three kinds of state:
//! - system fields (`id`, `ctime`, `mtime`) derived from the file name and
//!   the block markers, never stored in the header map
//! - the user header: an open, lowercase-keyed string map
//! - the raw record bytes, kept for display and body searches
//!
//! Status is not stored; it is computed from the `todo` header.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Days, NaiveDate};

use crate::error::{Error, Result};
use crate::record;

/// User-defined headers, ordered by key.
pub type Header = BTreeMap<String, String>;

/// File extension for tasks that still need attention.
pub const ACTIVE_EXT: &str = "todo";

/// File extension for tasks that are done or muted.
pub const DONE_EXT: &str = "done";

/// Header key whose value drives [`Status`].
pub const STATUS_KEY: &str = "todo";

/// Fields computed by the store rather than read from the header map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemField {
    Id,
    Ctime,
    Mtime,
}

impl SystemField {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "id" => Some(SystemField::Id),
            "ctime" => Some(SystemField::Ctime),
            "mtime" => Some(SystemField::Mtime),
            _ => None,
        }
    }
}

/// Derived task state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Active,
    Done,
    Muted,
    /// Deferred until the given `YYYY-MM-DD` date.
    Snoozed(String),
}

impl Status {
    /// Derive status from the value of the `todo` header.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some("done") => Status::Done,
            Some("mute") => Status::Muted,
            Some(other) => match other.strip_prefix("snooze ") {
                Some(date) => Status::Snoozed(date.trim().to_string()),
                None => Status::Active,
            },
            None => Status::Active,
        }
    }

    /// Done and muted tasks are hidden from the active set.
    pub fn is_done(&self) -> bool {
        matches!(self, Status::Done | Status::Muted)
    }

    /// Snoozed until `days` after `today`.
    pub fn snoozed_for(today: NaiveDate, days: u32) -> Self {
        let until = today
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(today);
        Status::Snoozed(until.format("%Y-%m-%d").to_string())
    }

    /// The `todo` header value that produces this status.
    pub fn value(&self) -> String {
        match self {
            Status::Active => String::new(),
            Status::Done => "done".to_string(),
            Status::Muted => "mute".to_string(),
            Status::Snoozed(date) => format!("snooze {date}"),
        }
    }

    /// File extension the backing record must carry for this status.
    pub fn extension(&self) -> &'static str {
        if self.is_done() {
            DONE_EXT
        } else {
            ACTIVE_EXT
        }
    }
}

/// One task: identity, current header state and full history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: String,
    file: PathBuf,
    header: Header,
    body: Vec<u8>,
    alternate_ids: Vec<String>,
    ctime: String,
    mtime: String,
}

impl Task {
    /// A task with no history yet, backed by `file`.
    pub(crate) fn empty(id: impl Into<String>, file: PathBuf) -> Self {
        Self {
            id: id.into(),
            file,
            header: Header::new(),
            body: Vec::new(),
            alternate_ids: Vec::new(),
            ctime: String::new(),
            mtime: String::new(),
        }
    }

    /// Rebuild a task from the contents of its record file.
    pub fn from_record(id: impl Into<String>, file: PathBuf, data: Vec<u8>) -> Result<Self> {
        if !record::starts_with_marker(&data) {
            return Err(Error::Malformed(file));
        }
        let parsed = record::parse(&data);
        Ok(Self {
            id: id.into(),
            file,
            header: parsed.header,
            body: data,
            alternate_ids: parsed.alternate_ids,
            ctime: parsed.ctime,
            mtime: parsed.mtime,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `title` header, or an empty string.
    pub fn title(&self) -> &str {
        self.header("title").unwrap_or("")
    }

    pub fn ctime(&self) -> &str {
        &self.ctime
    }

    pub fn mtime(&self) -> &str {
        &self.mtime
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn alternate_ids(&self) -> &[String] {
        &self.alternate_ids
    }

    /// User headers only; system fields are not part of this map.
    pub fn headers(&self) -> &Header {
        &self.header
    }

    /// A user header value. Keys are matched case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.header.get(&key).map(String::as_str)
    }

    pub fn system(&self, field: SystemField) -> &str {
        match field {
            SystemField::Id => &self.id,
            SystemField::Ctime => &self.ctime,
            SystemField::Mtime => &self.mtime,
        }
    }

    /// Resolve `key` as a system field when it names one, otherwise as a
    /// user header. Missing values (including an empty ctime on a task with
    /// no blocks) yield `None`.
    pub fn field(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        match SystemField::parse(&key) {
            Some(field) => Some(self.system(field)).filter(|value| !value.is_empty()),
            None => self.header.get(&key).map(String::as_str),
        }
    }

    pub fn status(&self) -> Status {
        Status::from_value(self.header(STATUS_KEY))
    }

    pub fn is_done(&self) -> bool {
        self.status().is_done()
    }

    /// Fold one appended block into the in-memory state.
    pub(crate) fn apply_block(&mut self, entries: &Header, block: &[u8], timestamp: &str) {
        for (key, value) in entries {
            if key == record::ALTERNATE_ID_KEY {
                self.alternate_ids.push(value.clone());
            } else if key.starts_with('#') {
                continue;
            } else if value.is_empty() {
                self.header.remove(key);
            } else {
                self.header.insert(key.clone(), value.clone());
            }
        }
        self.body.extend_from_slice(block);
        if self.ctime.is_empty() {
            self.ctime = timestamp.to_string();
        }
        self.mtime = timestamp.to_string();
    }

    pub(crate) fn set_file(&mut self, file: PathBuf) {
        self.file = file;
    }

    /// Display form: header summary (title first), a blank line, then the
    /// blocks newest first.
    pub fn print_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_header(w, &self.header)?;
        for block in record::split_blocks(&self.body).into_iter().rev() {
            w.write_all(block)?;
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.print_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Header entries shared with identical values by every task in a set.
/// Used as the editable baseline of a bulk edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonHeader {
    header: Header,
}

impl CommonHeader {
    pub fn of(tasks: &[Arc<Task>]) -> Self {
        let mut iter = tasks.iter();
        let mut header = match iter.next() {
            Some(first) => first.header.clone(),
            None => Header::new(),
        };
        for task in iter {
            header.retain(|key, value| task.header.get(key) == Some(value));
        }
        Self { header }
    }

    pub fn headers(&self) -> &Header {
        &self.header
    }

    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let _ = write_header(&mut buf, &self.header);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn write_header<W: Write>(w: &mut W, header: &Header) -> io::Result<()> {
    if let Some(title) = header.get("title") {
        writeln!(w, "title: {title}")?;
    }
    for (key, value) in header.iter().filter(|(key, _)| key.as_str() != "title") {
        writeln!(w, "{key}: {value}")?;
    }
    writeln!(w)
}
