//! todo lists/look command implementations.

use serde::Serialize;

use crate::cli::task::plural;
use crate::cli::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, emit_text, Summary};
use crate::registry::Lookup;
use crate::task::STATUS_KEY;

pub struct LookOptions {
    pub path: String,
}

#[derive(Serialize)]
struct ListsReport {
    list: String,
    sublists: Vec<String>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum LookReport {
    List { list: String, tasks: usize },
    Task { list: String, id: String, title: String },
    Tasks { list: String, ids: Vec<String> },
}

pub fn run_lists(ctx: &Context) -> Result<()> {
    let sublists = ctx.list.sublists()?;
    let text: String = sublists.iter().map(|name| format!("{name}/\n")).collect();
    let report = ListsReport {
        list: ctx.list.name().to_string(),
        sublists,
    };
    emit_text(ctx.output, "lists", &report, &text)
}

pub fn run_look(ctx: &Context, options: LookOptions) -> Result<()> {
    let found = ctx
        .registry
        .lookup(&ctx.list, &options.path)?
        .ok_or_else(|| Error::NotFound(options.path.clone()))?;

    let (report, summary) = match found {
        Lookup::List(list) => {
            let count = list.all()?.len();
            let mut summary = Summary::new(format!("todo look: list {}", list.name()));
            summary
                .field("open", plural(count))
                .hint(format!("todo -d {} search", list.name()));
            (
                LookReport::List {
                    list: list.name().to_string(),
                    tasks: count,
                },
                summary,
            )
        }
        Lookup::Task { list, task } => {
            let mut summary = Summary::new(format!("todo look: task {}", task.id()));
            summary
                .field("list", list.name())
                .field("title", task.title())
                .field(STATUS_KEY, task.status().value())
                .hint(format!("todo -d {} show {}", list.name(), task.id()));
            (
                LookReport::Task {
                    list: list.name().to_string(),
                    id: task.id().to_string(),
                    title: task.title().to_string(),
                },
                summary,
            )
        }
        Lookup::Tasks { list, tasks } => {
            let mut summary = Summary::new(format!("todo look: {}", plural(tasks.len())));
            summary.field("list", list.name());
            for task in &tasks {
                summary.task(task.id(), task.title());
            }
            (
                LookReport::Tasks {
                    list: list.name().to_string(),
                    ids: tasks.iter().map(|task| task.id().to_string()).collect(),
                },
                summary,
            )
        }
    };
    emit_success(ctx.output, "look", &report, &summary)
}
