//! External editor invocation and the edit workflows built on it.

use std::fs;
use std::io::Write;
use std::process::Command;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info};

use crate::bulk::{BulkEdit, BulkOutcome};
use crate::config::Config;
use crate::document::{self, CREATE_TEMPLATE};
use crate::error::{Error, Result};
use crate::list::List;
use crate::task::Task;

/// Characters that make an editor setting a shell command line.
const SHELL_MAGIC: &[char] = &[
    '|', '&', ';', '<', '>', '(', ')', '$', '`', '\\', '"', '\'', ' ', '\t', '\n', '*', '?', '[',
    '#', '~', '=', '%',
];

/// Something that turns a document into an edited document.
pub trait TextEditor {
    fn edit(&self, original: &str) -> Result<String>;
}

impl<F> TextEditor for F
where
    F: Fn(&str) -> Result<String>,
{
    fn edit(&self, original: &str) -> Result<String> {
        self(original)
    }
}

/// The user's editor, run on a temporary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemEditor {
    command: String,
}

impl SystemEditor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Config override, then `$VISUAL`, then `$EDITOR`, then `ed`.
    pub fn from_config(config: &Config) -> Self {
        let command = config
            .editor
            .clone()
            .or_else(|| non_empty_env("VISUAL"))
            .or_else(|| non_empty_env("EDITOR"))
            .unwrap_or_else(|| "ed".to_string());
        Self::new(command)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn build(&self, file: &std::path::Path) -> Command {
        if self.command.contains(SHELL_MAGIC) {
            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(format!("{} \"$@\"", self.command))
                .arg("$EDITOR")
                .arg(file);
            cmd
        } else {
            let mut cmd = Command::new(&self.command);
            cmd.arg(file);
            cmd
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

impl TextEditor for SystemEditor {
    fn edit(&self, original: &str) -> Result<String> {
        let mut file = tempfile::Builder::new().prefix("todo-edit-").tempfile()?;
        file.write_all(original.as_bytes())?;
        file.flush()?;

        debug!(editor = %self.command, file = %file.path().display(), "starting editor");
        let status = self
            .build(file.path())
            .status()
            .map_err(|err| Error::Editor(format!("{}: {err}", self.command)))?;
        if !status.success() {
            return Err(Error::Editor(format!("{} exited with {status}", self.command)));
        }

        let bytes = fs::read(file.path())?;
        String::from_utf8(bytes)
            .map_err(|_| Error::Editor("edited text is not valid UTF-8".to_string()))
    }
}

/// Edit one task. Returns the updated task, or `None` if nothing changed.
pub fn edit_task(list: &List, task: &Task, editor: &dyn TextEditor) -> Result<Option<Arc<Task>>> {
    let original = task.render();
    let updated = editor.edit(&original)?;
    document::apply_task_edit(list, task, &original, &updated, Local::now())
}

/// Create a task from the template. Returns `None` if the template came
/// back untouched.
pub fn edit_new(list: &List, editor: &dyn TextEditor) -> Result<Option<Arc<Task>>> {
    let updated = editor.edit(CREATE_TEMPLATE)?;
    if updated == CREATE_TEMPLATE {
        info!("no changes made");
        return Ok(None);
    }
    document::create_from_document(list, &updated, Local::now()).map(Some)
}

/// Edit several tasks as one document.
pub fn edit_bulk(list: &List, tasks: &[Arc<Task>], editor: &dyn TextEditor) -> Result<BulkOutcome> {
    let bulk = BulkEdit::start(tasks);
    let updated = editor.edit(bulk.document())?;
    bulk.apply(list, &updated)
}
