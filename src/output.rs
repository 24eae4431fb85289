//! Command results for the terminal and for `--json`.
//!
//! Human output reuses the task record's own shapes: `key: value` lines for
//! facts and `id<TAB>title` lines for tasks. JSON output wraps the command's
//! data in a versioned envelope.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "todo.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human-readable result of a command.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    headline: String,
    fields: Vec<(String, String)>,
    lines: Vec<String>,
    notes: Vec<String>,
    hints: Vec<String>,
}

impl Summary {
    pub fn new(headline: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            ..Self::default()
        }
    }

    pub fn field(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    /// One task, listed the way `search` lists it.
    pub fn task(&mut self, id: &str, title: &str) -> &mut Self {
        if title.is_empty() {
            self.lines.push(id.to_string());
        } else {
            self.lines.push(format!("{id}\t{title}"));
        }
        self
    }

    pub fn note(&mut self, note: impl Into<String>) -> &mut Self {
        self.notes.push(note.into());
        self
    }

    pub fn hint(&mut self, command: impl Into<String>) -> &mut Self {
        self.hints.push(command.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.headline);
        for (key, value) in &self.fields {
            out.push_str(&format!("{key}: {value}\n"));
        }
        if !self.lines.is_empty() {
            out.push('\n');
            for line in &self.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        for note in &self.notes {
            out.push_str(&format!("note: {note}\n"));
        }
        for hint in &self.hints {
            out.push_str(&format!("try: {hint}\n"));
        }
        out
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonError>,
    #[serde(skip_serializing_if = "is_empty")]
    notes: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    hints: &'a [String],
}

fn is_empty(items: &&[String]) -> bool {
    items.is_empty()
}

fn print_json<T: Serialize>(envelope: &Envelope<'_, T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

/// Emit `data` as JSON, or the rendered summary.
pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    summary: &Summary,
) -> Result<()> {
    if options.json {
        return print_json(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data: Some(data),
            error: None,
            notes: &summary.notes,
            hints: &summary.hints,
        });
    }
    if !options.quiet {
        print!("{}", summary.render());
    }
    Ok(())
}

/// Emit `data` as JSON, or print `text` verbatim. For commands whose human
/// form is the raw document (task bodies, listings).
pub fn emit_text<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    text: &str,
) -> Result<()> {
    if options.json {
        return emit_success(options, command, data, &Summary::default());
    }
    if !options.quiet {
        print!("{text}");
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hints = error_hints(err);
    if json {
        return print_json::<()>(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            data: None,
            error: Some(JsonError::from(err)),
            notes: &[],
            hints: &hints,
        });
    }

    eprintln!("error: {err}");
    if let Error::PartialBulkFailure { failures, .. } = err {
        for failure in failures {
            eprintln!("\t{}: {}", failure.id, failure.reason.replace('\n', "\n\t"));
        }
    }
    for hint in &hints {
        eprintln!("try: {hint}");
    }
    Ok(())
}

/// Best-effort command name for error envelopes, read before clap parses.
pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(mut args: impl Iterator<Item = String>) -> String {
    while let Some(arg) = args.next() {
        if matches!(arg.as_str(), "--root" | "-d" | "--list") {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg;
    }
    "todo".to_string()
}

fn error_hints(err: &Error) -> Vec<String> {
    match err {
        Error::NotFound(_) => vec!["todo search all".to_string()],
        Error::InvalidConfig(_) => vec!["fix .todo.toml then retry".to_string()],
        Error::PartialBulkFailure { failures, .. } => failures
            .iter()
            .map(|failure| format!("todo show {}", failure.id))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BulkFailure;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn command_name_skips_global_flags() {
        assert_eq!(command_name(args(&["--root", "/tmp/x", "-q", "show", "1"])), "show");
        assert_eq!(command_name(args(&["-d", "work", "search"])), "search");
        assert_eq!(command_name(args(&["--json"])), "todo");
    }

    #[test]
    fn summary_uses_record_shapes() {
        let mut summary = Summary::new("todo done: updated 2 tasks");
        summary
            .field("status", "done")
            .task("1", "water plants")
            .task("3", "")
            .note("already done: 4")
            .hint("todo show 1");
        assert_eq!(
            summary.render(),
            "todo done: updated 2 tasks\nstatus: done\n\n1\twater plants\n3\nnote: already done: 4\ntry: todo show 1\n"
        );
        assert_eq!(Summary::new("todo new: 4").render(), "todo new: 4\n");
    }

    #[test]
    fn error_envelope_carries_kind_and_hints() {
        let err = Error::PartialBulkFailure {
            attempted: vec!["1".into(), "2".into()],
            succeeded: vec!["1".into()],
            failures: vec![BulkFailure {
                id: "2".into(),
                reason: "gone".into(),
            }],
        };
        let hints = error_hints(&err);
        let envelope = Envelope::<()> {
            schema_version: SCHEMA_VERSION,
            command: "done",
            status: "error",
            data: None,
            error: Some(JsonError::from(&err)),
            notes: &[],
            hints: &hints,
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["error"]["kind"], "partial_failure");
        assert_eq!(value["hints"][0], "todo show 2");
        assert!(value.get("data").is_none());
        assert!(value.get("notes").is_none());
    }
}
