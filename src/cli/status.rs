//! todo done/mute/snooze command implementations.
//!
//! One task gets a single block with the new `todo` value. A query result
//! goes through the bulk edit path so a failure on one task leaves the rest
//! updated and is reported as a partial failure.

use chrono::Local;
use serde::Serialize;

use crate::bulk::{self, BulkEdit};
use crate::cli::task::{ids, plural};
use crate::cli::{select, Context, Selection};
use crate::error::Result;
use crate::output::{emit_success, Summary};
use crate::task::{Header, Status, STATUS_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Done,
    Mute,
    Snooze(u32),
}

impl Change {
    fn status(self) -> Status {
        match self {
            Change::Done => Status::Done,
            Change::Mute => Status::Muted,
            Change::Snooze(days) => Status::snoozed_for(Local::now().date_naive(), days),
        }
    }

    fn command(self) -> &'static str {
        match self {
            Change::Done => "done",
            Change::Mute => "mute",
            Change::Snooze(_) => "snooze",
        }
    }
}

pub struct StatusOptions {
    pub targets: Vec<String>,
    pub change: Change,
}

#[derive(Serialize)]
struct StatusReport {
    status: String,
    updated: Vec<String>,
    unchanged: Vec<String>,
}

pub fn run(ctx: &Context, options: StatusOptions) -> Result<()> {
    let status = options.change.status();
    let value = status.value();
    let command = options.change.command();

    let mut report = StatusReport {
        status: value.clone(),
        updated: Vec::new(),
        unchanged: Vec::new(),
    };

    match select(&ctx.list, &options.targets)? {
        Selection::Single(task) => {
            if options.change == Change::Done && task.header(STATUS_KEY) == Some("done") {
                report.unchanged.push(task.id().to_string());
            } else {
                let mut changes = Header::new();
                changes.insert(STATUS_KEY.to_string(), value.clone());
                ctx.list.write(&task, &changes, "")?;
                report.updated.push(task.id().to_string());
            }
        }
        Selection::Many(tasks) => {
            let (already, pending): (Vec<_>, Vec<_>) = tasks.into_iter().partition(|task| {
                options.change == Change::Done && task.header(STATUS_KEY) == Some("done")
            });
            report.unchanged = ids(&already);
            if !pending.is_empty() {
                let edit = BulkEdit::start(&pending);
                let document = format!("{STATUS_KEY}: {value}\n{}", edit.document());
                report.updated = bulk::apply(&ctx.list, &document, Local::now())?;
            }
        }
    }

    let mut summary = Summary::new(format!(
        "todo {command}: updated {}",
        plural(report.updated.len())
    ));
    summary.field(STATUS_KEY, value);
    for id in &report.updated {
        summary.task(id, "");
    }
    if !report.unchanged.is_empty() {
        summary.note(format!("already done: {}", report.unchanged.join(", ")));
    }
    emit_success(ctx.output, command, &report, &summary)
}
