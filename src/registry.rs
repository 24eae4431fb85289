//! Registry of open lists under one todo root.
//!
//! The registry hands out one shared [`List`] per directory so every caller
//! sees the same cache. Names are `/`-separated paths relative to the root;
//! `.` is the root itself.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::list::{is_valid_id, List, DEFAULT_CREATE_ATTEMPTS};
use crate::task::Task;

/// Prefix marking a path as rooted at the todo root.
pub const ROOT_PREFIX: &str = "/todo/";

/// Name used for the pseudo-entry naming a whole list.
const ALL: &str = "all";

/// What a looked-up path refers to.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// A whole list.
    List(Arc<List>),
    /// One task in a list.
    Task { list: Arc<List>, task: Arc<Task> },
    /// Several tasks named by the lines of a multi-line text.
    Tasks {
        list: Arc<List>,
        tasks: Vec<Arc<Task>>,
    },
}

#[derive(Debug)]
pub struct Registry {
    root: PathBuf,
    create_attempts: usize,
    lists: Mutex<HashMap<PathBuf, Arc<List>>>,
}

impl Registry {
    /// Open a registry over `root`. The root is resolved once, so list
    /// names map to the same key whether or not their directory exists yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: resolve_root_dir(&root.into()),
            create_attempts: DEFAULT_CREATE_ATTEMPTS,
            lists: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        let mut registry = Self::new(root);
        registry.create_attempts = config.create_attempts;
        registry
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get or open the list called `name`.
    pub fn list(&self, name: &str) -> Result<Arc<List>> {
        let name = normalize_name(name)
            .ok_or_else(|| Error::InvalidArgument(format!("list name {name:?} escapes the root")))?;
        let dir = if name == "." {
            self.root.clone()
        } else {
            self.root.join(&name)
        };
        let mut lists = self.lists.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = lists.get(&dir) {
            return Ok(Arc::clone(list));
        }
        debug!(list = %name, dir = %dir.display(), "opening list");
        let list = List::open(name, dir.clone()).with_create_attempts(self.create_attempts);
        let list = Arc::new(list);
        lists.insert(dir, Arc::clone(&list));
        Ok(list)
    }

    /// Whether `name` names an existing list directory.
    pub fn is_list(&self, name: &str) -> bool {
        match normalize_name(name) {
            Some(name) if name == "." => self.root.is_dir(),
            Some(name) => self.root.join(name).is_dir(),
            None => false,
        }
    }

    /// Resolve `text` relative to `base`.
    ///
    /// Accepts a `/todo/`-prefixed path from the root, a task ID, a
    /// `list/id` path, or a list directory. Text spanning several lines
    /// resolves every line that starts with an existing task ID. Paths
    /// outside the todo tree resolve to nothing.
    pub fn lookup(&self, base: &List, text: &str) -> Result<Option<Lookup>> {
        if text.contains('\n') {
            let list = self.list(base.name())?;
            let mut tasks = Vec::new();
            for id in crate::bulk::line_ids(&list, text) {
                tasks.push(list.read(&id)?);
            }
            if tasks.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Lookup::Tasks { list, tasks }));
        }

        let text = text.trim();
        let full = if let Some(rest) = text.strip_prefix(ROOT_PREFIX) {
            normalize_name(rest)
        } else if text.starts_with('/') {
            None
        } else {
            normalize_name(&format!("{}/{}", base.name(), text))
        };
        let Some(full) = full else {
            return Ok(None);
        };

        if self.is_list(&full) {
            return Ok(Some(Lookup::List(self.list(&full)?)));
        }
        let (list_name, id) = match full.rsplit_once('/') {
            Some((list, id)) => (list.to_string(), id.to_string()),
            None => (".".to_string(), full),
        };
        if !self.is_list(&list_name) {
            return Ok(None);
        }
        let list = self.list(&list_name)?;
        if id == ALL {
            return Ok(Some(Lookup::List(list)));
        }
        if !is_valid_id(&id) {
            return Ok(None);
        }
        match list.read(&id) {
            Ok(task) => Ok(Some(Lookup::Task { list, task })),
            Err(Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Entry point for "open this item" notifications: `path` must be a
    /// single `/todo/...` line. Returns whether it named something.
    pub fn resolve(&self, path: &str) -> bool {
        if path.contains('\n') || !path.starts_with(ROOT_PREFIX) {
            debug!(path, "ignoring notification");
            return false;
        }
        let root = match self.list(".") {
            Ok(root) => root,
            Err(err) => {
                warn!(error = %err, "cannot open root list");
                return false;
            }
        };
        match self.lookup(&root, path) {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(path, error = %err, "lookup failed");
                false
            }
        }
    }
}

/// Canonical form of the root; an absolute path when it does not exist yet.
fn resolve_root_dir(root: &Path) -> PathBuf {
    fs::canonicalize(root)
        .or_else(|_| std::path::absolute(root))
        .unwrap_or_else(|_| root.to_path_buf())
}

/// Clean a `/`-separated list name. Returns `None` when `..` climbs above
/// the root.
fn normalize_name(name: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        Some(".".to_string())
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Header;
    use tempfile::tempdir;

    fn titled(title: &str) -> Header {
        let mut header = Header::new();
        header.insert("title".into(), title.into());
        header
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name(""), Some(".".into()));
        assert_eq!(normalize_name("./work//home/"), Some("work/home".into()));
        assert_eq!(normalize_name("work/../home"), Some("home".into()));
        assert_eq!(normalize_name("../x"), None);
    }

    #[test]
    fn same_directory_shares_one_list() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("work")).unwrap();
        let registry = Registry::new(dir.path());
        let a = registry.list("work").unwrap();
        let b = registry.list("./work/").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.list("../outside").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_root_shares_list_across_creation() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let registry = Registry::new(&link);
        assert_eq!(registry.root(), fs::canonicalize(&real).unwrap());
        let before = registry.list("work").unwrap();
        let task = before.create(Some("a"), &titled("a"), "").unwrap();
        let after = registry.list("work").unwrap();
        assert!(Arc::ptr_eq(&before, &after));

        let mut done = Header::new();
        done.insert("todo".into(), "done".into());
        before.write(&task, &done, "").unwrap();
        assert!(after.all().unwrap().is_empty());
        assert_eq!(after.done().unwrap().len(), 1);
    }

    #[test]
    fn missing_root_resolves_to_absolute_path() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path().join("later"));
        assert!(registry.root().is_absolute());
        let a = registry.list("x").unwrap();
        fs::create_dir_all(dir.path().join("later/x")).unwrap();
        let b = registry.list("x").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn lookup_resolves_tasks_and_lists() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("work")).unwrap();
        let registry = Registry::new(dir.path());
        let root = registry.list(".").unwrap();
        let work = registry.list("work").unwrap();
        work.create(Some("fix"), &titled("fix it"), "").unwrap();
        root.create(None, &titled("top"), "").unwrap();

        assert!(matches!(
            registry.lookup(&root, "work/fix").unwrap(),
            Some(Lookup::Task { task, .. }) if task.title() == "fix it"
        ));
        assert!(matches!(registry.lookup(&root, "work").unwrap(), Some(Lookup::List(_))));
        assert!(matches!(registry.lookup(&work, "../1").unwrap(), Some(Lookup::Task { .. })));
        assert!(matches!(registry.lookup(&work, "/todo/1").unwrap(), Some(Lookup::Task { .. })));
        assert!(registry.lookup(&root, "/etc/passwd").unwrap().is_none());
        assert!(registry.lookup(&root, "../../etc").unwrap().is_none());
        assert!(registry.lookup(&root, "missing").unwrap().is_none());
    }

    #[test]
    fn multi_line_lookup_collects_ids() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path());
        let root = registry.list(".").unwrap();
        root.create(None, &titled("one"), "").unwrap();
        root.create(None, &titled("two"), "").unwrap();

        let found = registry.lookup(&root, "1\tone\nnope\n2 two\n").unwrap();
        match found {
            Some(Lookup::Tasks { tasks, .. }) => {
                let ids: Vec<_> = tasks.iter().map(|t| t.id()).collect();
                assert_eq!(ids, vec!["1", "2"]);
            }
            other => panic!("unexpected lookup: {other:?}"),
        }
    }

    #[test]
    fn resolve_requires_rooted_single_line() {
        let dir = tempdir().unwrap();
        let registry = Registry::new(dir.path());
        registry.list(".").unwrap().create(None, &titled("x"), "").unwrap();

        assert!(registry.resolve("/todo/1"));
        assert!(registry.resolve("/todo/all"));
        assert!(!registry.resolve("1"));
        assert!(!registry.resolve("/todo/1\n"));
        assert!(!registry.resolve("/todo/42"));
    }
}
