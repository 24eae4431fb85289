//! Interactive editing sessions driven through a document host.
//!
//! A host is anything that holds one editable text buffer: an editor
//! window, a terminal pane, a test double. The session decides what goes
//! into the buffer and what to do with it when the user saves.

use std::sync::Arc;

use chrono::Local;
use tracing::debug;

use crate::bulk::{self, BulkEdit, BulkOutcome};
use crate::document::{self, CREATE_TEMPLATE};
use crate::error::{Error, Result};
use crate::list::List;
use crate::sort::SortKey;
use crate::task::{Status, Task, STATUS_KEY};

/// The editable buffer a session works on.
pub trait DocumentHost {
    fn read_text(&mut self) -> Result<String>;
    fn replace_text(&mut self, text: &str) -> Result<()>;
    fn report_error(&mut self, message: &str);
    /// Currently selected text, or an empty string.
    fn selection(&mut self) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// A new task from the template.
    Create,
    /// One task.
    Single(String),
    /// Listing of the tasks matching a query.
    List(String),
    /// Several tasks as one document.
    Bulk,
}

pub struct Session {
    list: Arc<List>,
    mode: Mode,
    sort: SortKey,
    /// Text last loaded into the host, for change detection.
    loaded: Option<String>,
    task: Option<Arc<Task>>,
    bulk: Option<BulkEdit>,
}

impl Session {
    pub fn new(list: Arc<List>, mode: Mode) -> Self {
        Self {
            list,
            mode,
            sort: SortKey::Title,
            loaded: None,
            task: None,
            bulk: None,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn list(&self) -> &Arc<List> {
        &self.list
    }

    /// (Re)load the buffer for the current mode.
    pub fn get(&mut self, host: &mut dyn DocumentHost) -> Result<()> {
        let result = self.load(host);
        report(host, result)
    }

    /// Save the buffer: create, edit or bulk-apply depending on the mode.
    pub fn put(&mut self, host: &mut dyn DocumentHost) -> Result<()> {
        let result = self.store(host);
        report(host, result)
    }

    pub fn done(&mut self, host: &mut dyn DocumentHost) -> Result<()> {
        self.set_status(host, Status::Done)
    }

    pub fn mute(&mut self, host: &mut dyn DocumentHost) -> Result<()> {
        self.set_status(host, Status::Muted)
    }

    pub fn snooze(&mut self, host: &mut dyn DocumentHost, days: u32) -> Result<()> {
        self.set_status(host, Status::snoozed_for(Local::now().date_naive(), days))
    }

    /// Change the listing order and reload. Only list sessions are sorted.
    pub fn sort_by(&mut self, host: &mut dyn DocumentHost, key: &str) -> Result<()> {
        if !matches!(self.mode, Mode::List(_)) {
            let err = Error::InvalidArgument("only task listings can be sorted".to_string());
            return report(host, Err(err));
        }
        self.sort = SortKey::parse(key);
        self.get(host)
    }

    fn load(&mut self, host: &mut dyn DocumentHost) -> Result<()> {
        let text = match &self.mode {
            Mode::Create => CREATE_TEMPLATE.to_string(),
            Mode::Single(id) => {
                let task = self.list.read(id)?;
                let text = task.render();
                self.task = Some(task);
                text
            }
            Mode::List(query) => self.listing(query)?,
            Mode::Bulk => {
                let current = host.read_text()?;
                let edit = BulkEdit::start_from_text(&self.list, &current)?;
                let text = edit.document().to_string();
                self.bulk = Some(edit);
                text
            }
        };
        host.replace_text(&text)?;
        self.loaded = Some(text);
        Ok(())
    }

    fn listing(&self, query: &str) -> Result<String> {
        let mut tasks = self.list.search_str(query)?;
        self.sort.apply(&mut tasks);

        let mut text = String::new();
        if query == "all" {
            let sublists = self.list.sublists()?;
            for name in &sublists {
                text.push_str(name);
                text.push_str("/\n");
            }
            if !sublists.is_empty() {
                text.push('\n');
            }
        } else {
            text.push_str(&format!("Search {query}\n\n"));
        }
        for task in &tasks {
            text.push_str(&format!("{}\t{}\n", task.id(), task.title()));
        }
        Ok(text)
    }

    fn store(&mut self, host: &mut dyn DocumentHost) -> Result<()> {
        match self.mode.clone() {
            Mode::Create => {
                let text = host.read_text()?;
                let task = document::create_from_document(&self.list, &text, Local::now())?;
                debug!(id = task.id(), "created from session");
                self.mode = Mode::Single(task.id().to_string());
                self.load(host)
            }
            Mode::Single(id) => {
                let text = host.read_text()?;
                let task = match &self.task {
                    Some(task) => Arc::clone(task),
                    None => self.list.read(&id)?,
                };
                let original = self.loaded.clone().unwrap_or_default();
                document::apply_task_edit(&self.list, &task, &original, &text, Local::now())?;
                self.load(host)
            }
            Mode::Bulk => {
                let text = host.read_text()?;
                let outcome = match &self.bulk {
                    Some(edit) => edit.apply(&self.list, &text)?,
                    None => BulkOutcome::Applied(bulk::apply(&self.list, &text, Local::now())?),
                };
                match outcome {
                    BulkOutcome::Unchanged => {
                        host.report_error("no changes made");
                        Ok(())
                    }
                    BulkOutcome::Applied(ids) => {
                        host.report_error(&updated_message(ids.len()));
                        self.load(host)
                    }
                }
            }
            Mode::List(_) => Err(Error::InvalidArgument(
                "cannot put a task listing".to_string(),
            )),
        }
    }

    fn set_status(&mut self, host: &mut dyn DocumentHost, status: Status) -> Result<()> {
        let line = format!("{STATUS_KEY}: {}\n", status.value());
        let mode = self.mode.clone();
        let result = match mode {
            Mode::Single(_) | Mode::Bulk => self.prepend_and_store(host, &line),
            Mode::List(_) => self.apply_to_selection(host, &line),
            Mode::Create => Err(Error::InvalidArgument(
                "save the new task before changing its status".to_string(),
            )),
        };
        report(host, result)
    }

    fn prepend_and_store(&mut self, host: &mut dyn DocumentHost, line: &str) -> Result<()> {
        let text = host.read_text()?;
        host.replace_text(&format!("{line}{text}"))?;
        self.store(host)
    }

    fn apply_to_selection(&mut self, host: &mut dyn DocumentHost, line: &str) -> Result<()> {
        let selection = host.selection()?;
        if selection.trim().is_empty() {
            return Err(Error::InvalidArgument("select tasks first".to_string()));
        }
        let edit = BulkEdit::start_from_text(&self.list, &selection)?;
        let document = format!("{line}{}", edit.document());
        let ids = bulk::apply(&self.list, &document, Local::now())?;
        host.report_error(&updated_message(ids.len()));
        self.load(host)
    }
}

fn updated_message(count: usize) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("updated {count} task{suffix}")
}

fn report(host: &mut dyn DocumentHost, result: Result<()>) -> Result<()> {
    if let Err(err) = &result {
        host.report_error(&err.to_string());
    }
    result
}
