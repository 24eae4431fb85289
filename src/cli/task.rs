//! todo show/search/new/edit command implementations.

use std::sync::Arc;

use serde::Serialize;

use crate::bulk::BulkOutcome;
use crate::cli::{select, Context, Selection};
use crate::editor::{self, SystemEditor};
use crate::error::{Error, Result};
use crate::output::{emit_success, emit_text, Summary};
use crate::sort::{self, SortKey};
use crate::task::{Header, Task};

pub struct ShowOptions {
    pub id: String,
}

pub struct SearchOptions {
    pub query: Vec<String>,
    pub sort: String,
}

pub struct NewOptions {
    pub title: Option<String>,
    pub id: Option<String>,
    pub headers: Vec<String>,
    pub comment: String,
}

pub struct EditOptions {
    pub targets: Vec<String>,
}

#[derive(Serialize)]
struct TaskView {
    id: String,
    list: String,
    title: String,
    status: String,
    ctime: String,
    mtime: String,
    headers: Header,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    alternate_ids: Vec<String>,
    file: String,
}

impl TaskView {
    fn of(list: &str, task: &Task) -> Self {
        Self {
            id: task.id().to_string(),
            list: list.to_string(),
            title: task.title().to_string(),
            status: task.status().value(),
            ctime: task.ctime().to_string(),
            mtime: task.mtime().to_string(),
            headers: task.headers().clone(),
            alternate_ids: task.alternate_ids().to_vec(),
            file: task.file().display().to_string(),
        }
    }
}

#[derive(Serialize)]
struct ShowReport {
    #[serde(flatten)]
    task: TaskView,
    text: String,
}

#[derive(Serialize)]
struct SearchReport {
    query: String,
    tasks: Vec<TaskView>,
}

#[derive(Serialize)]
struct EditReport {
    updated: Vec<String>,
}

pub fn run_show(ctx: &Context, options: ShowOptions) -> Result<()> {
    let task = ctx.list.read(&options.id)?;
    let text = task.render();
    let report = ShowReport {
        task: TaskView::of(ctx.list.name(), &task),
        text: text.clone(),
    };
    emit_text(ctx.output, "show", &report, &text)
}

pub fn run_search(ctx: &Context, options: SearchOptions) -> Result<()> {
    let query = if options.query.is_empty() {
        "all".to_string()
    } else {
        options.query.join(" ")
    };
    let mut tasks = ctx.list.search_str(&query)?;
    SortKey::parse(&options.sort).apply(&mut tasks);

    let mut text = String::new();
    for task in &tasks {
        text.push_str(&format!("{}\t{}\n", task.id(), task.title()));
    }
    let report = SearchReport {
        query,
        tasks: tasks
            .iter()
            .map(|task| TaskView::of(ctx.list.name(), task))
            .collect(),
    };
    emit_text(ctx.output, "search", &report, &text)
}

pub fn run_new(ctx: &Context, options: NewOptions) -> Result<()> {
    let interactive = options.title.is_none()
        && options.id.is_none()
        && options.headers.is_empty()
        && options.comment.is_empty();

    let task = if interactive {
        let editor = SystemEditor::from_config(&ctx.config);
        match editor::edit_new(&ctx.list, &editor)? {
            Some(task) => task,
            None => {
                let mut summary = Summary::new("todo new: nothing created");
                summary.note("template was left unchanged");
                let report = EditReport { updated: Vec::new() };
                return emit_success(ctx.output, "new", &report, &summary);
            }
        }
    } else {
        let mut header = parse_headers(&options.headers)?;
        if let Some(title) = options.title {
            header.insert("title".to_string(), title);
        }
        ctx.list.create(options.id.as_deref(), &header, &options.comment)?
    };

    let mut summary = Summary::new(format!("todo new: {}", task.id()));
    summary
        .field("title", task.title())
        .field("list", ctx.list.name())
        .hint(format!("todo show {}", task.id()));
    emit_success(
        ctx.output,
        "new",
        &TaskView::of(ctx.list.name(), &task),
        &summary,
    )
}

pub fn run_edit(ctx: &Context, options: EditOptions) -> Result<()> {
    let editor = SystemEditor::from_config(&ctx.config);
    let updated = match select(&ctx.list, &options.targets)? {
        Selection::Single(task) => editor::edit_task(&ctx.list, &task, &editor)?
            .map(|task| vec![task.id().to_string()])
            .unwrap_or_default(),
        Selection::Many(mut tasks) => {
            sort::by_title(&mut tasks);
            match editor::edit_bulk(&ctx.list, &tasks, &editor)? {
                BulkOutcome::Unchanged => Vec::new(),
                BulkOutcome::Applied(ids) => ids,
            }
        }
    };

    let header = if updated.is_empty() {
        "todo edit: no changes made".to_string()
    } else {
        format!("todo edit: updated {}", plural(updated.len()))
    };
    let mut summary = Summary::new(header);
    for id in &updated {
        summary.task(id, "");
    }
    emit_success(ctx.output, "edit", &EditReport { updated }, &summary)
}

pub(crate) fn plural(count: usize) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} task{suffix}")
}

/// Parse `key=value` arguments into a header.
fn parse_headers(raw: &[String]) -> Result<Header> {
    let mut header = Header::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(Error::InvalidArgument(format!(
                "header '{entry}' must look like key=value"
            )));
        };
        header.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(header)
}

/// IDs of `tasks`, in order.
pub(crate) fn ids(tasks: &[Arc<Task>]) -> Vec<String> {
    tasks.iter().map(|task| task.id().to_string()).collect()
}
