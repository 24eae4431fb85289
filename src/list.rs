//! Directory-backed task store.
//!
//! Each task is one file `<id>.todo` (active or snoozed) or `<id>.done`
//! (done or muted). Blocks are appended, never rewritten; a status change
//! renames the file in place.
//!
//! Loaded tasks are cached for the lifetime of the [`List`]. Changes made to
//! the directory by other processes are not picked up once a task is cached.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::query::Query;
use crate::record;
use crate::task::{Header, Status, SystemField, Task, ACTIVE_EXT, DONE_EXT, STATUS_KEY};

/// Default bound on auto-allocated ID attempts.
pub const DEFAULT_CREATE_ATTEMPTS: usize = 3;

/// Whether `id` is a valid task name (`[0-9a-z_-]+`).
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase() || b == b'_' || b == b'-')
}

#[derive(Debug, Default)]
struct ListState {
    tasks: HashMap<String, Arc<Task>>,
    scanned_active: bool,
    scanned_done: bool,
}

/// A named collection of tasks backed by one directory.
#[derive(Debug)]
pub struct List {
    name: String,
    dir: PathBuf,
    create_attempts: usize,
    state: Mutex<ListState>,
}

impl List {
    /// Open the list `name` stored in `dir`. No IO happens until first use.
    pub fn open(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            create_attempts: DEFAULT_CREATE_ATTEMPTS,
            state: Mutex::new(ListState::default()),
        }
    }

    pub fn with_create_attempts(mut self, attempts: usize) -> Self {
        self.create_attempts = attempts.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn path_for(&self, id: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{id}.{ext}"))
    }

    /// Subdirectories usable as nested lists, sorted by name.
    pub fn sublists(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('_') || name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Whether a task exists, without loading it.
    pub fn exists(&self, id: &str) -> bool {
        if !is_valid_id(id) {
            return false;
        }
        let state = self.lock();
        state.tasks.contains_key(id)
            || self.path_for(id, ACTIVE_EXT).exists()
            || self.path_for(id, DONE_EXT).exists()
    }

    /// Load a task, from the cache when possible.
    pub fn read(&self, id: &str) -> Result<Arc<Task>> {
        if !is_valid_id(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        let mut state = self.lock();
        self.read_locked(&mut state, id)
    }

    fn read_locked(&self, state: &mut ListState, id: &str) -> Result<Arc<Task>> {
        if let Some(task) = state.tasks.get(id) {
            return Ok(Arc::clone(task));
        }
        let (file, data) = match self.load_file(id, ACTIVE_EXT)? {
            Some(found) => found,
            None => match self.load_file(id, DONE_EXT)? {
                Some(found) => found,
                None => return Err(Error::NotFound(id.to_string())),
            },
        };
        let task = Arc::new(Task::from_record(id, file, data)?);
        state.tasks.insert(id.to_string(), Arc::clone(&task));
        Ok(task)
    }

    fn load_file(&self, id: &str, ext: &str) -> Result<Option<(PathBuf, Vec<u8>)>> {
        let path = self.path_for(id, ext);
        match fs::read(&path) {
            Ok(data) => Ok(Some((path, data))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Append a block to `task` stamped with the current local time.
    pub fn write(&self, task: &Task, changes: &Header, comment: &str) -> Result<Arc<Task>> {
        self.write_at(task, Local::now(), changes, comment)
    }

    /// Append a block to `task` with an explicit timestamp.
    ///
    /// An empty value removes the key from the current header but is still
    /// recorded. Editing a done (not muted) task reopens it unless the
    /// changes set `todo` themselves.
    pub fn write_at(
        &self,
        task: &Task,
        now: DateTime<Local>,
        changes: &Header,
        comment: &str,
    ) -> Result<Arc<Task>> {
        let entries = normalize_changes(changes)?;
        let mut state = self.lock();
        let current = state
            .tasks
            .get(task.id())
            .cloned()
            .unwrap_or_else(|| Arc::new(task.clone()));
        self.append_locked(&mut state, &current, now, entries, comment)
    }

    fn append_locked(
        &self,
        state: &mut ListState,
        current: &Task,
        now: DateTime<Local>,
        mut entries: Header,
        comment: &str,
    ) -> Result<Arc<Task>> {
        if current.status() == Status::Done && !entries.contains_key(STATUS_KEY) {
            entries.insert(STATUS_KEY.to_string(), String::new());
        }

        let comment = comment.trim_end_matches('\n');
        let block = record::render_block(
            &now,
            entries.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            comment.as_bytes(),
        );

        let mut file = OpenOptions::new().append(true).open(current.file())?;
        file.write_all(&block)?;
        file.sync_all()?;
        debug!(list = %self.name, id = current.id(), bytes = block.len(), "appended block");

        let timestamp = now.format(record::TIMESTAMP_FORMAT).to_string();
        let mut updated = current.clone();
        updated.apply_block(&entries, &block, &timestamp);

        let wanted = updated.status().extension();
        let actual = updated
            .file()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if wanted != actual {
            let target = self.path_for(updated.id(), wanted);
            if let Err(err) = fs::rename(updated.file(), &target) {
                warn!(list = %self.name, id = updated.id(), error = %err, "rename failed");
                // The block is on disk; keep the cache honest about it and
                // retry the rename on the next write.
                state
                    .tasks
                    .insert(updated.id().to_string(), Arc::new(updated));
                return Err(err.into());
            }
            info!(list = %self.name, id = updated.id(), ext = wanted, "renamed task file");
            updated.set_file(target);
        }

        let updated = Arc::new(updated);
        state
            .tasks
            .insert(updated.id().to_string(), Arc::clone(&updated));
        Ok(updated)
    }

    /// Create a task. With `id` it must be new; without, the next free
    /// numeric ID is allocated.
    pub fn create(&self, id: Option<&str>, header: &Header, comment: &str) -> Result<Arc<Task>> {
        self.create_at(id, Local::now(), header, comment)
    }

    pub fn create_at(
        &self,
        id: Option<&str>,
        now: DateTime<Local>,
        header: &Header,
        comment: &str,
    ) -> Result<Arc<Task>> {
        let entries = normalize_changes(header)?;
        let mut state = self.lock();
        fs::create_dir_all(&self.dir)?;

        let (id, file) = match id {
            Some(id) => (id.to_string(), self.create_explicit(&state, id)?),
            None => self.create_next(&state)?,
        };
        info!(list = %self.name, id = %id, "created task");
        self.fill_new(&mut state, &id, file, now, entries, comment)
    }

    /// Write the first block into a freshly created file. On failure the
    /// file and any cache entry are removed again.
    fn fill_new(
        &self,
        state: &mut ListState,
        id: &str,
        file: PathBuf,
        now: DateTime<Local>,
        entries: Header,
        comment: &str,
    ) -> Result<Arc<Task>> {
        let empty = Task::empty(id, file);
        match self.append_locked(state, &empty, now, entries, comment) {
            Ok(task) => Ok(task),
            Err(err) => {
                state.tasks.remove(id);
                if let Err(remove_err) = fs::remove_file(empty.file()) {
                    warn!(id, error = %remove_err, "could not remove file after failed create");
                }
                Err(err)
            }
        }
    }

    fn create_explicit(&self, state: &ListState, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            return Err(Error::InvalidId(id.to_string()));
        }
        if state.tasks.contains_key(id) || self.path_for(id, DONE_EXT).exists() {
            return Err(Error::AlreadyExists(id.to_string()));
        }
        let path = self.path_for(id, ACTIVE_EXT);
        match create_new(&path) {
            Ok(()) => Ok(path),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(Error::AlreadyExists(id.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn create_next(&self, state: &ListState) -> Result<(String, PathBuf)> {
        let max = self.max_numeric_id()?;
        for step in 1..=self.create_attempts as u64 {
            let Some(next) = max.checked_add(step) else {
                break;
            };
            let id = next.to_string();
            if state.tasks.contains_key(&id) || self.path_for(&id, DONE_EXT).exists() {
                continue;
            }
            let path = self.path_for(&id, ACTIVE_EXT);
            match create_new(&path) {
                Ok(()) => return Ok((id, path)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(list = %self.name, id = %id, "id taken, trying next");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "could not allocate a task id in {} after {} attempts",
                self.dir.display(),
                self.create_attempts
            ),
        )))
    }

    /// Largest numeric task ID on disk, 0 when there is none.
    fn max_numeric_id(&self) -> Result<u64> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut max = 0;
        for entry in entries {
            let path = entry?.path();
            let ext = path.extension().and_then(|ext| ext.to_str());
            if !matches!(ext, Some(ACTIVE_EXT) | Some(DONE_EXT)) {
                continue;
            }
            if let Some(n) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            {
                max = max.max(n);
            }
        }
        Ok(max)
    }

    /// Active and snoozed tasks, sorted by ID.
    pub fn all(&self) -> Result<Vec<Arc<Task>>> {
        self.collect(false)
    }

    /// Done and muted tasks, sorted by ID.
    pub fn done(&self) -> Result<Vec<Arc<Task>>> {
        self.collect(true)
    }

    fn collect(&self, done: bool) -> Result<Vec<Arc<Task>>> {
        let mut state = self.lock();
        let scanned = if done {
            state.scanned_done
        } else {
            state.scanned_active
        };
        if !scanned {
            self.scan(&mut state, if done { DONE_EXT } else { ACTIVE_EXT })?;
            if done {
                state.scanned_done = true;
            } else {
                state.scanned_active = true;
            }
        }
        let mut tasks: Vec<Arc<Task>> = state
            .tasks
            .values()
            .filter(|task| task.is_done() == done)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(tasks)
    }

    fn scan(&self, state: &mut ListState, ext: &str) -> Result<()> {
        let dir = self.dir.to_string_lossy();
        let pattern = format!("{}/*.{ext}", glob::Pattern::escape(&dir));
        let paths = glob::glob(&pattern)
            .map_err(|err| Error::InvalidArgument(format!("list path {dir}: {err}")))?;

        let mut loaded = 0usize;
        for path in paths {
            let path = path.map_err(glob::GlobError::into_error)?;
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if !is_valid_id(id) || state.tasks.contains_key(id) {
                continue;
            }
            match self.read_locked(state, id) {
                Ok(_) => loaded += 1,
                Err(Error::Malformed(file)) => {
                    warn!(file = %file.display(), "skipping malformed task file");
                }
                Err(err) => return Err(err),
            }
        }
        debug!(list = %self.name, ext, loaded, "scanned list directory");
        Ok(())
    }

    /// Tasks matching `query`: matching active tasks, then matching done
    /// tasks when the query asks for them.
    pub fn search(&self, query: &Query) -> Result<Vec<Arc<Task>>> {
        let mut found: Vec<Arc<Task>> = self
            .all()?
            .into_iter()
            .filter(|task| query.matches(task))
            .collect();
        if query.needs_done() {
            found.extend(self.done()?.into_iter().filter(|task| query.matches(task)));
        }
        Ok(found)
    }

    /// Parse `query` against today's date and search.
    pub fn search_str(&self, query: &str) -> Result<Vec<Arc<Task>>> {
        self.search(&Query::parse(query)?)
    }
}

fn create_new(path: &Path) -> io::Result<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(drop)
}

/// Lowercase keys, drop system fields and reject entries that would corrupt
/// the record syntax.
fn normalize_changes(changes: &Header) -> Result<Header> {
    let mut entries = Header::new();
    for (key, value) in changes {
        let key = key.trim().to_lowercase();
        if SystemField::parse(&key).is_some() {
            continue;
        }
        if key.is_empty() || key.contains(':') || key.contains('\n') {
            return Err(Error::InvalidArgument(format!("invalid header key {key:?}")));
        }
        if value.contains('\n') {
            return Err(Error::InvalidArgument(format!(
                "header value for {key:?} spans multiple lines"
            )));
        }
        entries.insert(key, value.trim().to_string());
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn header(pairs: &[(&str, &str)]) -> Header {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn at(day: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2019, 6, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn valid_ids() {
        assert!(is_valid_id("12"));
        assert!(is_valid_id("fix-the_bug"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("Upper"));
        assert!(!is_valid_id("../x"));
        assert!(!is_valid_id("a b"));
    }

    #[test]
    fn create_writes_first_block() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        let task = list
            .create_at(Some("alpha"), at(1), &header(&[("Title", "first")]), "note")
            .unwrap();

        let data = fs::read_to_string(dir.path().join("alpha.todo")).unwrap();
        assert!(data.starts_with("— 2019-06-01 12:00:00 —\ntitle: first\n\nnote\n\n"));
        assert_eq!(task.title(), "first");
        assert_eq!(task.ctime(), "2019-06-01 12:00:00");
    }

    #[test]
    fn system_keys_are_not_stored() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        let task = list
            .create(None, &header(&[("id", "9"), ("mtime", "x"), ("title", "t")]), "")
            .unwrap();
        assert_eq!(task.id(), "1");
        assert_eq!(task.headers().len(), 1);
    }

    #[test]
    fn rejects_multiline_values() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        let err = list
            .create(None, &header(&[("title", "a\nb")]), "")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(!dir.path().join("1.todo").exists());
    }

    #[test]
    fn editing_done_task_reopens_it() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        let task = list.create(None, &header(&[("title", "x")]), "").unwrap();
        let task = list
            .write_at(&task, at(2), &header(&[("todo", "done")]), "")
            .unwrap();
        assert!(task.file().ends_with("1.done"));

        let task = list
            .write_at(&task, at(3), &header(&[("prio", "low")]), "")
            .unwrap();
        assert_eq!(task.status(), Status::Active);
        assert!(task.file().ends_with("1.todo"));
        let data = fs::read_to_string(task.file()).unwrap();
        assert!(data.ends_with("— 2019-06-03 12:00:00 —\nprio: low\ntodo: \n\n"));
    }

    #[test]
    fn editing_muted_task_keeps_it_muted() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        let task = list.create(None, &header(&[("todo", "mute")]), "").unwrap();
        assert!(task.file().ends_with("1.done"));
        let task = list.write(&task, &header(&[("prio", "low")]), "").unwrap();
        assert_eq!(task.status(), Status::Muted);
        assert!(dir.path().join("1.done").exists());
    }

    #[test]
    fn failed_write_leaves_cache_untouched() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        let task = list.create(None, &header(&[("title", "x")]), "").unwrap();
        fs::remove_file(task.file()).unwrap();

        assert!(list.write(&task, &header(&[("title", "y")]), "").is_err());
        assert_eq!(list.read("1").unwrap().title(), "x");
    }

    #[test]
    fn create_attempts_are_bounded() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path()).with_create_attempts(2);
        fs::write(dir.path().join("4.todo"), "").unwrap();
        // Cached IDs that have no file on disk still count as taken.
        {
            let mut state = list.lock();
            for id in ["5", "6"] {
                let task = Task::empty(id, dir.path().join(format!("{id}.todo")));
                state.tasks.insert(id.to_string(), Arc::new(task));
            }
        }
        let err = list.create(None, &Header::new(), "").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn malformed_files_fail_read_and_are_skipped_by_scan() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        fs::write(dir.path().join("bad.todo"), "title: nope\n").unwrap();
        list.create(Some("good"), &header(&[("title", "ok")]), "").unwrap();

        assert!(matches!(list.read("bad"), Err(Error::Malformed(_))));
        let ids: Vec<_> = list.all().unwrap().iter().map(|t| t.id().to_string()).collect();
        assert_eq!(ids, vec!["good"]);
    }

    #[test]
    fn sublists_skip_hidden_and_underscore() {
        let dir = tempdir().unwrap();
        for name in ["work", "_archive", ".git", "home"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("1.todo"), "").unwrap();
        let list = List::open(".", dir.path());
        assert_eq!(list.sublists().unwrap(), vec!["home", "work"]);
    }

    #[cfg(unix)]
    #[test]
    fn blocked_rename_fails_then_retries() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        let task = list.create(None, &header(&[("title", "x")]), "").unwrap();
        fs::create_dir(dir.path().join("1.done")).unwrap();

        let err = list
            .write_at(&task, at(2), &header(&[("todo", "done")]), "")
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        let cached = list.read("1").unwrap();
        assert_eq!(cached.status(), Status::Done);
        assert!(cached.file().ends_with("1.todo"));

        fs::remove_dir(dir.path().join("1.done")).unwrap();
        let task = list
            .write_at(&cached, at(3), &header(&[("todo", "done")]), "again")
            .unwrap();
        assert!(task.file().ends_with("1.done"));
        assert!(!dir.path().join("1.todo").exists());
        let data = fs::read_to_string(dir.path().join("1.done")).unwrap();
        assert!(data.contains("— 2019-06-02 12:00:00 —\ntodo: done\n"));
        assert!(data.ends_with("— 2019-06-03 12:00:00 —\ntodo: done\n\nagain\n\n"));
    }

    #[cfg(unix)]
    #[test]
    fn failed_first_write_removes_new_file() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        let file = dir.path().join("gone.todo");
        create_new(&file).unwrap();
        fs::create_dir(dir.path().join("gone.done")).unwrap();

        let mut state = list.lock();
        let err = list
            .fill_new(
                &mut state,
                "gone",
                file.clone(),
                at(1),
                header(&[("todo", "done")]),
                "",
            )
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!file.exists());
        assert!(!state.tasks.contains_key("gone"));
    }

    #[test]
    fn exhausted_numeric_ids_fail_to_allocate() {
        let dir = tempdir().unwrap();
        let list = List::open("work", dir.path());
        fs::write(dir.path().join(format!("{}.todo", u64::MAX)), "").unwrap();

        let err = list.create(None, &header(&[("title", "x")]), "").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!dir.path().join("0.todo").exists());
    }
}
