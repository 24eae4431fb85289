//! todo import command implementation.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::task::plural;
use crate::cli::Context;
use crate::error::{Error, Result};
use crate::import::{self, ImportReport};
use crate::output::{emit_success, Summary};

/// Parent list for imported repositories.
const IMPORT_LIST: &str = "git";

pub struct ImportOptions {
    pub repo: PathBuf,
}

#[derive(Serialize)]
struct ImportOutput {
    list: String,
    #[serde(flatten)]
    report: ImportReport,
}

pub fn run(ctx: &Context, options: ImportOptions) -> Result<()> {
    let repo = std::fs::canonicalize(&options.repo)?;
    let name = repo
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            Error::InvalidArgument(format!("cannot name a list after {}", repo.display()))
        })?;

    let list = ctx.registry.list(&format!("{IMPORT_LIST}/{name}"))?;
    let report = import::import_repo(&list, &repo)?;

    let mut summary = Summary::new(format!(
        "todo import: created {}",
        plural(report.created.len())
    ));
    summary
        .field("list", list.name())
        .field("skipped", report.skipped.to_string());
    if !report.created.is_empty() {
        summary.hint(format!("todo -d {} search", list.name()));
    }

    let output = ImportOutput {
        list: list.name().to_string(),
        report,
    };
    emit_success(ctx.output, "import", &output, &summary)
}
