//! Display orderings for task listings.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::task::Task;

/// Sort key for IDs that are not numbers; keeps them after numeric ones.
const NON_NUMERIC: u64 = 999_999_999;

/// Title, then ID.
pub fn by_title(tasks: &mut [Arc<Task>]) {
    tasks.sort_by(|a, b| a.title().cmp(b.title()).then_with(|| a.id().cmp(b.id())));
}

/// Value of `key` (system field or header, missing sorts first), then ID.
pub fn by_field(tasks: &mut [Arc<Task>], key: &str) {
    tasks.sort_by(|a, b| {
        let fa = a.field(key).unwrap_or("");
        let fb = b.field(key).unwrap_or("");
        fa.cmp(fb).then_with(|| a.id().cmp(b.id()))
    });
}

/// Numeric ID order (`2` before `10`), ties broken textually.
pub fn by_numeric_id(tasks: &mut [Arc<Task>]) {
    tasks.sort_by(|a, b| compare_numeric(a.id(), b.id()));
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let na = a.parse::<u64>().unwrap_or(NON_NUMERIC);
    let nb = b.parse::<u64>().unwrap_or(NON_NUMERIC);
    na.cmp(&nb).then_with(|| a.cmp(b))
}

/// Named orderings accepted on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Id,
    Field(String),
}

impl SortKey {
    pub fn parse(name: &str) -> Self {
        match name {
            "" | "title" => SortKey::Title,
            "id" => SortKey::Id,
            other => SortKey::Field(other.to_lowercase()),
        }
    }

    pub fn apply(&self, tasks: &mut [Arc<Task>]) {
        match self {
            SortKey::Title => by_title(tasks),
            SortKey::Id => by_numeric_id(tasks),
            SortKey::Field(key) => by_field(tasks, key),
        }
    }
}
