//! Editing several tasks through one document.
//!
//! The document holds the header entries the tasks share, a comment area
//! and a manifest of `id<TAB>title` lines. Applying it validates the whole
//! document first, then writes each listed task on its own: one task
//! failing does not undo or block the others.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::document;
use crate::error::{BulkFailure, Error, Result};
use crate::list::List;
use crate::record::MARKER_PREFIX;
use crate::task::{CommonHeader, Task};

/// Line introducing the manifest, including the newline before it.
pub const BULK_HEADER: &str = "\n— Bulk editing these tasks:";

/// Result of applying a bulk document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    /// The document came back byte-identical; nothing was written.
    Unchanged,
    /// Every listed task was updated.
    Applied(Vec<String>),
}

/// A bulk edit in progress.
#[derive(Debug, Clone)]
pub struct BulkEdit {
    baseline: CommonHeader,
    document: String,
}

impl BulkEdit {
    /// Render the document for `tasks`, in the order given.
    pub fn start(tasks: &[Arc<Task>]) -> Self {
        let baseline = CommonHeader::of(tasks);
        let mut document = baseline.render();
        document.push('\n');
        document.push_str(BULK_HEADER);
        document.push_str("\n\n");
        for task in tasks {
            document.push_str(task.id());
            document.push('\t');
            document.push_str(task.title());
            document.push('\n');
        }
        Self { baseline, document }
    }

    /// Start from free text (a listing or an earlier document): every line
    /// whose first word is an existing task ID is included.
    pub fn start_from_text(list: &List, text: &str) -> Result<Self> {
        let ids = line_ids(list, text);
        if ids.is_empty() {
            return Err(Error::InvalidArgument("found no tasks in selection".to_string()));
        }
        let mut tasks = Vec::new();
        let mut last_err = None;
        for id in ids {
            match list.read(&id) {
                Ok(task) => tasks.push(task),
                Err(err) => last_err = Some(err),
            }
        }
        match (tasks.is_empty(), last_err) {
            (true, Some(err)) => Err(err),
            _ => Ok(Self::start(&tasks)),
        }
    }

    pub fn baseline(&self) -> &CommonHeader {
        &self.baseline
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    /// Apply the edited document, stamped with the current time.
    pub fn apply(&self, list: &List, updated: &str) -> Result<BulkOutcome> {
        self.apply_at(list, updated, Local::now())
    }

    pub fn apply_at(&self, list: &List, updated: &str, now: DateTime<Local>) -> Result<BulkOutcome> {
        if updated == self.document {
            return Ok(BulkOutcome::Unchanged);
        }
        apply(list, updated, now).map(BulkOutcome::Applied)
    }
}

/// Apply a bulk document to every task in its manifest.
///
/// Returns the IDs attempted when all succeed. If any task fails the error
/// is [`Error::PartialBulkFailure`]; tasks that succeeded stay updated.
pub fn apply(list: &List, updated: &str, now: DateTime<Local>) -> Result<Vec<String>> {
    let ids = manifest_ids(list, updated)?;
    document::parse(updated, None)?;

    info!(list = list.name(), count = ids.len(), "applying bulk edit");
    let mut succeeded = Vec::new();
    let mut failures = Vec::new();
    for id in &ids {
        match apply_one(list, id, updated, now) {
            Ok(()) => succeeded.push(id.clone()),
            Err(err) => {
                warn!(list = list.name(), id = %id, error = %err, "bulk edit failed for task");
                failures.push(BulkFailure {
                    id: id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    if failures.is_empty() {
        Ok(ids)
    } else {
        Err(Error::PartialBulkFailure {
            attempted: ids,
            succeeded,
            failures,
        })
    }
}

fn apply_one(list: &List, id: &str, updated: &str, now: DateTime<Local>) -> Result<()> {
    let task = list.read(id)?;
    let edit = document::parse(updated, Some(task.headers()))?;
    if edit.is_empty() {
        return Ok(());
    }
    list.write_at(&task, now, &edit.header, &edit.comment)?;
    Ok(())
}

/// IDs listed in the manifest of a bulk document.
pub fn manifest_ids(list: &List, document: &str) -> Result<Vec<String>> {
    let Some(start) = document.find(BULK_HEADER) else {
        return Err(Error::Format(vec![
            "cannot find bulk edit task list".to_string(),
        ]));
    };
    let manifest = &document[start + 1..];
    let mut lines = manifest.lines();
    lines.next();
    let section: Vec<&str> = lines
        .take_while(|line| !line.starts_with(MARKER_PREFIX))
        .collect();

    let ids = existing_ids(list, section);
    if ids.is_empty() {
        return Err(Error::Format(vec![
            "found no tasks in bulk edit task list".to_string(),
        ]));
    }
    Ok(ids)
}

/// IDs of existing tasks named at the start of any line of `text`.
pub fn line_ids(list: &List, text: &str) -> Vec<String> {
    existing_ids(list, text.lines())
}

fn existing_ids<'a>(list: &List, lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for line in lines {
        let id = line.split(['\t', ' ']).next().unwrap_or_default();
        if list.exists(id) && seen.insert(id.to_string()) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Header;
    use std::fs;
    use tempfile::tempdir;

    fn header(pairs: &[(&str, &str)]) -> Header {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn seeded() -> (tempfile::TempDir, List) {
        let dir = tempdir().unwrap();
        let list = List::open(".", dir.path());
        list.create(None, &header(&[("title", "one"), ("prio", "high")]), "")
            .unwrap();
        list.create(None, &header(&[("title", "two"), ("prio", "high")]), "")
            .unwrap();
        (dir, list)
    }

    #[test]
    fn document_layout() {
        let (_dir, list) = seeded();
        let tasks = list.all().unwrap();
        let edit = BulkEdit::start(&tasks);
        assert_eq!(
            edit.document(),
            "prio: high\n\n\n\n— Bulk editing these tasks:\n\n1\tone\n2\ttwo\n"
        );
        assert_eq!(edit.baseline().headers(), &header(&[("prio", "high")]));
    }

    #[test]
    fn unchanged_document_writes_nothing() {
        let (dir, list) = seeded();
        let before = fs::read(dir.path().join("1.todo")).unwrap();
        let edit = BulkEdit::start(&list.all().unwrap());
        let outcome = edit.apply(&list, edit.document()).unwrap();
        assert_eq!(outcome, BulkOutcome::Unchanged);
        assert_eq!(fs::read(dir.path().join("1.todo")).unwrap(), before);
    }

    #[test]
    fn format_error_aborts_before_any_write() {
        let (dir, list) = seeded();
        let before = fs::read(dir.path().join("2.todo")).unwrap();
        let edit = BulkEdit::start(&list.all().unwrap());
        let updated = format!("nonsense\n{}", edit.document().replace("high", "low"));

        let err = edit.apply(&list, &updated).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert_eq!(fs::read(dir.path().join("2.todo")).unwrap(), before);
    }

    #[test]
    fn applies_header_and_comment_to_each_task() {
        let (_dir, list) = seeded();
        let edit = BulkEdit::start(&list.all().unwrap());
        let updated = edit
            .document()
            .replacen("prio: high\n\n", "prio: low\n\nreprioritized\n", 1);

        let outcome = edit.apply(&list, &updated).unwrap();
        assert_eq!(outcome, BulkOutcome::Applied(vec!["1".into(), "2".into()]));
        for id in ["1", "2"] {
            let task = list.read(id).unwrap();
            assert_eq!(task.header("prio"), Some("low"));
            assert!(String::from_utf8_lossy(task.body()).contains("\nreprioritized\n"));
        }
    }

    #[test]
    fn manifest_requires_delimiter_and_ids() {
        let (_dir, list) = seeded();
        assert!(matches!(manifest_ids(&list, "prio: x\n\n1\tone\n"), Err(Error::Format(_))));
        let none = "prio: x\n\n\n— Bulk editing these tasks:\n\n9\tnine\n";
        assert!(matches!(manifest_ids(&list, none), Err(Error::Format(_))));
        let stops = "\n— Bulk editing these tasks:\n\n1\tone\n— 2019-06-01 10:00:00 —\n2\n";
        assert_eq!(manifest_ids(&list, stops).unwrap(), vec!["1"]);
    }

    #[test]
    fn start_from_text_reads_listing_lines() {
        let (_dir, list) = seeded();
        let edit = BulkEdit::start_from_text(&list, "Search all\n\n2\ttwo\n1\tone\n").unwrap();
        assert!(edit.document().ends_with("\n2\ttwo\n1\tone\n"));
        assert!(BulkEdit::start_from_text(&list, "nothing here").is_err());
    }
}
