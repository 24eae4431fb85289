#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{IndexAddOption, Oid, Repository, Signature};
use tempfile::TempDir;
use todo::list::List;
use todo::registry::Registry;
use todo::task::{Header, Task};

/// A scratch todo root.
pub struct TestRoot {
    dir: TempDir,
    registry: Registry,
}

impl TestRoot {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let registry = Registry::new(dir.path());
        Self { dir, registry }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The root list, shared through the registry.
    pub fn list(&self) -> Arc<List> {
        self.registry.list(".").expect("root list")
    }

    /// A list that bypasses the shared cache, as a second process would.
    pub fn fresh_list(&self) -> List {
        List::open(".", self.dir.path())
    }

    pub fn create(&self, title: &str, extra: &[(&str, &str)]) -> Arc<Task> {
        self.list()
            .create(None, &header(title, extra), "")
            .expect("create task")
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_file(&self, rel_path: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel_path)).expect("read file")
    }
}

pub fn header(title: &str, extra: &[(&str, &str)]) -> Header {
    let mut header = Header::new();
    header.insert("title".to_string(), title.to_string());
    for (key, value) in extra {
        header.insert(key.to_string(), value.to_string());
    }
    header
}

pub fn ids(tasks: &[Arc<Task>]) -> Vec<&str> {
    tasks.iter().map(|task| task.id()).collect()
}

/// A scratch git repository with a fixed identity.
pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    pub fn init() -> Result<Self, git2::Error> {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let repo = Repository::init(dir.path())?;
        set_identity(&repo)?;
        Ok(Self { dir, repo })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn commit_all(&self, message: &str) -> Result<Oid, git2::Error> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("todo-test", "todo-test@example.com")?;

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| self.repo.find_commit(oid).ok());
        let parents: Vec<_> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
    }
}

fn set_identity(repo: &Repository) -> Result<(), git2::Error> {
    let mut config = repo.config()?;
    config.set_str("user.name", "todo-test")?;
    config.set_str("user.email", "todo-test@example.com")?;
    Ok(())
}
