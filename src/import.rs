//! Import a git commit log as tasks.
//!
//! Each commit becomes one task named by a short hash prefix. Re-running an
//! import skips commits that already have a task.

use std::path::Path;

use chrono::{Local, TimeZone};
use git2::{Commit, DiffFormat, DiffStatsFormat, ErrorCode, Repository, Signature, Sort};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::list::List;
use crate::task::Header;

/// Shortest hash prefix used as a task ID.
pub const MIN_PREFIX: usize = 7;

/// Patches at or above this size are left out of the task body.
pub const MAX_PATCH_BYTES: usize = 32 * 1024;

const REVIEWED_ON: &str = "Reviewed-on:";

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// IDs of tasks created, newest commit first.
    pub created: Vec<String>,
    /// Commits that were already imported.
    pub skipped: usize,
}

/// Import every commit reachable from HEAD of the repository at `repo_path`.
pub fn import_repo(list: &List, repo_path: &Path) -> Result<ImportReport> {
    let repo = Repository::discover(repo_path)?;
    let mut report = ImportReport::default();

    let mut revwalk = repo.revwalk()?;
    match revwalk.push_head() {
        Ok(()) => {}
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            debug!(repo = %repo_path.display(), "no commits to import");
            return Ok(report);
        }
        Err(err) => return Err(err.into()),
    }
    revwalk.set_sorting(Sort::TOPOLOGICAL)?;

    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        match import_commit(list, &repo, &commit)? {
            Some(id) => report.created.push(id),
            None => report.skipped += 1,
        }
    }

    info!(
        list = list.name(),
        created = report.created.len(),
        skipped = report.skipped,
        "imported git log"
    );
    Ok(report)
}

/// Create the task for one commit. Returns `None` if it was imported before.
fn import_commit(list: &List, repo: &Repository, commit: &Commit<'_>) -> Result<Option<String>> {
    let hash = commit.id().to_string();
    let header = commit_header(commit, &hash);
    let body = commit_body(repo, commit)?;
    let when = Local
        .timestamp_opt(commit.time().seconds(), 0)
        .single()
        .unwrap_or_else(Local::now);

    for len in MIN_PREFIX..=hash.len() {
        let id = &hash[..len];
        match list.read(id) {
            Ok(task) if task.header("commit") == Some(hash.as_str()) => return Ok(None),
            Ok(_) => continue,
            Err(Error::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        match list.create_at(Some(id), when, &header, &body) {
            Ok(task) => return Ok(Some(task.id().to_string())),
            Err(Error::AlreadyExists(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(Error::AlreadyExists(hash))
}

fn commit_header(commit: &Commit<'_>, hash: &str) -> Header {
    let message = commit.message().unwrap_or_default();
    let mut header = Header::new();
    header.insert(
        "title".to_string(),
        commit.summary().unwrap_or_default().trim().to_string(),
    );
    header.insert("commit".to_string(), hash.to_string());
    header.insert("author".to_string(), person(&commit.author()));
    header.insert("committer".to_string(), person(&commit.committer()));
    if let Some(url) = reviewed_on(message) {
        header.insert("url".to_string(), url);
    }
    header
}

fn person(sig: &Signature<'_>) -> String {
    format!(
        "{} <{}>",
        sig.name().unwrap_or_default(),
        sig.email().unwrap_or_default()
    )
}

/// Value of the last `Reviewed-on:` line in a commit message.
fn reviewed_on(message: &str) -> Option<String> {
    message
        .lines()
        .filter_map(|line| line.trim().strip_prefix(REVIEWED_ON))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .last()
}

/// Commit message, diffstat and (when small enough) the patch.
fn commit_body(repo: &Repository, commit: &Commit<'_>) -> Result<String> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree()?),
        Err(_) => None,
    };
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

    let mut body = commit.message().unwrap_or_default().trim().to_string();
    body.push_str("\n\n");

    let stats = diff.stats()?.to_buf(DiffStatsFormat::FULL, 80)?;
    body.push_str(&String::from_utf8_lossy(&stats));

    let mut patch = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            patch.push(line.origin() as u8);
        }
        patch.extend_from_slice(line.content());
        true
    })?;
    if patch.len() < MAX_PATCH_BYTES {
        body.push('\n');
        body.push_str(&String::from_utf8_lossy(&patch));
    } else {
        debug!(commit = %commit.id(), bytes = patch.len(), "patch too large, omitted");
    }
    Ok(body)
}
