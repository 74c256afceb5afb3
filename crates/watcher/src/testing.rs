//! In-memory adapters for driving sessions deterministically
//!
//! [`MemoryFs`] implements both [`Notifier`] and [`FileSystem`] over a
//! tree kept in memory. Mutations deliver raw notifications the way a
//! native backend would: the parent directory hears about entries that
//! appear or disappear, and the entry itself hears about content changes.
//! Failures can be injected per operation and path.
//!
//! Pair it with `#[tokio::test(start_paused = true)]` to run debounce and
//! polling scenarios on virtual time.

use crate::error::{ErrorCode, PlatformError};
use crate::event::{EntryStat, RawKind};
use crate::platform::{Adapters, FileSystem, Notifier, RawSink, Subscription};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::time::Instant;

/// Adapter operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Subscribe,
    List,
    Stat,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    File { len: u64 },
    Dir,
}

struct Watch {
    path: PathBuf,
    sink: RawSink,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<PathBuf, Node>,
    watches: HashMap<u64, Watch>,
    next_watch: u64,
    failures: HashMap<(Op, PathBuf), VecDeque<ErrorCode>>,
    subscribe_log: Vec<(PathBuf, Instant)>,
}

type Delivery = (RawSink, RawKind, Option<String>);

impl Inner {
    fn take_failure(&mut self, op: Op, path: &Path) -> Option<ErrorCode> {
        let key = (op, path.to_path_buf());
        let queue = self.failures.get_mut(&key)?;
        let code = queue.pop_front();
        if queue.is_empty() {
            self.failures.remove(&key);
        }
        code
    }

    /// Queue a notification for every watch on `path`
    fn queue(&self, path: &Path, kind: RawKind, name: &str, out: &mut Vec<Delivery>) {
        for watch in self.watches.values().filter(|w| w.path == path) {
            out.push((watch.sink.clone(), kind, Some(name.to_string())));
        }
    }

    fn queue_parent(&self, path: &Path, kind: RawKind, out: &mut Vec<Delivery>) {
        if let (Some(parent), Some(name)) = (path.parent(), file_name(path)) {
            self.queue(parent, kind, &name, out);
        }
    }

    /// `mkdir -p`, notifying the parent of every directory created
    fn ensure_dir(&mut self, path: &Path, out: &mut Vec<Delivery>) {
        if self.nodes.contains_key(path) {
            return;
        }
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent, out);
        }
        self.nodes.insert(path.to_path_buf(), Node::Dir);
        self.queue_parent(path, RawKind::Rename, out);
    }

    /// Remove `path` and everything below it, deepest first
    fn remove_tree(&mut self, path: &Path, out: &mut Vec<Delivery>) {
        let victims: Vec<PathBuf> = self
            .nodes
            .keys()
            .filter(|p| p.starts_with(path))
            .cloned()
            .collect();

        for victim in victims.iter().rev() {
            self.nodes.remove(victim);
            self.queue_parent(victim, RawKind::Rename, out);
            if let Some(name) = file_name(victim) {
                self.queue(victim, RawKind::Rename, &name, out);
            }
            // A deleted inode stops reporting
            self.watches.retain(|_, w| w.path != *victim);
        }
    }

    fn children(&self, path: &Path) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| file_name(p))
            .collect()
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn deliver(out: Vec<Delivery>) {
    for (sink, kind, name) in out {
        sink.deliver(kind, name);
    }
}

/// Shared in-memory file tree; clones see the same tree
#[derive(Clone, Default)]
pub struct MemoryFs {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.inner.lock().nodes.insert(PathBuf::from("/"), Node::Dir);
        fs
    }

    /// Adapter pair backed by this tree
    pub fn adapters(&self) -> Adapters {
        Adapters::new(Arc::new(self.clone()), Arc::new(self.clone()))
    }

    /// Create a directory and any missing ancestors
    pub fn create_dir(&self, path: impl AsRef<Path>) {
        let mut out = Vec::new();
        self.inner.lock().ensure_dir(path.as_ref(), &mut out);
        deliver(out);
    }

    /// Create or overwrite a file
    pub fn write(&self, path: impl AsRef<Path>, contents: &[u8]) {
        let path = path.as_ref();
        let mut out = Vec::new();
        {
            let mut inner = self.inner.lock();
            if let Some(parent) = path.parent() {
                inner.ensure_dir(parent, &mut out);
            }

            let existed = inner.nodes.contains_key(path);
            inner.nodes.insert(
                path.to_path_buf(),
                Node::File {
                    len: contents.len() as u64,
                },
            );

            if !existed {
                inner.queue_parent(path, RawKind::Rename, &mut out);
            }
            inner.queue_parent(path, RawKind::Change, &mut out);
            if let Some(name) = file_name(path) {
                inner.queue(path, RawKind::Change, &name, &mut out);
            }
        }
        deliver(out);
    }

    /// Delete a file or a whole directory tree
    pub fn remove(&self, path: impl AsRef<Path>) {
        let mut out = Vec::new();
        self.inner.lock().remove_tree(path.as_ref(), &mut out);
        deliver(out);
    }

    /// Move `from` (and anything below it) to `to`, replacing `to`
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) {
        let (from, to) = (from.as_ref(), to.as_ref());
        let mut out = Vec::new();
        {
            let mut inner = self.inner.lock();
            let moved: Vec<(PathBuf, Node)> = inner
                .nodes
                .iter()
                .filter(|(p, _)| p.starts_with(from))
                .map(|(p, node)| (p.clone(), *node))
                .collect();
            if moved.is_empty() {
                return;
            }

            // A replaced target hears about its own removal; its parent
            // only hears the rename below
            if let Some(name) = file_name(to) {
                inner.queue(to, RawKind::Rename, &name, &mut out);
            }
            let mut discard = Vec::new();
            inner.remove_tree(to, &mut discard);

            for (path, node) in moved {
                inner.nodes.remove(&path);
                let target = match path.strip_prefix(from) {
                    Ok(rel) if rel.as_os_str().is_empty() => to.to_path_buf(),
                    Ok(rel) => to.join(rel),
                    Err(_) => continue,
                };
                inner.nodes.insert(target, node);
            }

            inner.queue_parent(from, RawKind::Rename, &mut out);
            if let Some(name) = file_name(from) {
                inner.queue(from, RawKind::Rename, &name, &mut out);
            }
            inner.queue_parent(to, RawKind::Rename, &mut out);
            inner.watches.retain(|_, w| !w.path.starts_with(from));
        }
        deliver(out);
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.inner.lock().nodes.contains_key(path.as_ref())
    }

    /// Fail the next `op` on `path` with `code`
    pub fn fail_next(&self, op: Op, path: impl AsRef<Path>, code: ErrorCode) {
        self.fail_times(op, path, code, 1);
    }

    /// Fail the next `times` calls of `op` on `path` with `code`
    pub fn fail_times(&self, op: Op, path: impl AsRef<Path>, code: ErrorCode, times: usize) {
        let mut inner = self.inner.lock();
        let queue = inner
            .failures
            .entry((op, path.as_ref().to_path_buf()))
            .or_default();
        queue.extend(std::iter::repeat(code).take(times));
    }

    /// Deliver a notification to the watches on `path` without touching the tree
    pub fn notify_raw(&self, path: impl AsRef<Path>, kind: RawKind, name: Option<&str>) {
        let path = path.as_ref();
        let out: Vec<Delivery> = {
            let inner = self.inner.lock();
            inner
                .watches
                .values()
                .filter(|w| w.path == path)
                .map(|w| (w.sink.clone(), kind, name.map(str::to_string)))
                .collect()
        };
        deliver(out);
    }

    /// Number of subscribe attempts made for `path`, failed ones included
    pub fn subscribe_count(&self, path: impl AsRef<Path>) -> usize {
        self.subscribe_times(path).len()
    }

    /// When each subscribe attempt for `path` happened
    pub fn subscribe_times(&self, path: impl AsRef<Path>) -> Vec<Instant> {
        let path = path.as_ref();
        self.inner
            .lock()
            .subscribe_log
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn active_watches(&self) -> usize {
        self.inner.lock().watches.len()
    }

    pub fn is_watched(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.inner.lock().watches.values().any(|w| w.path == path)
    }

    fn list_now(&self, path: &Path) -> Result<Vec<String>, PlatformError> {
        let mut inner = self.inner.lock();
        if let Some(code) = inner.take_failure(Op::List, path) {
            return Err(PlatformError::new(code, path, "injected list failure"));
        }
        match inner.nodes.get(path) {
            Some(Node::Dir) => Ok(inner.children(path)),
            Some(Node::File { .. }) => Err(PlatformError::new(
                ErrorCode::NotADirectory,
                path,
                "not a directory",
            )),
            None => Err(PlatformError::not_found(path)),
        }
    }

    fn stat_now(&self, path: &Path) -> Result<EntryStat, PlatformError> {
        let mut inner = self.inner.lock();
        if let Some(code) = inner.take_failure(Op::Stat, path) {
            return Err(PlatformError::new(code, path, "injected stat failure"));
        }
        match inner.nodes.get(path) {
            Some(Node::Dir) => Ok(EntryStat::directory()),
            Some(Node::File { len }) => Ok(EntryStat::file(*len)),
            None => Err(PlatformError::not_found(path)),
        }
    }
}

struct MemorySubscription {
    id: u64,
    path: PathBuf,
    inner: Weak<Mutex<Inner>>,
}

impl Subscription for MemorySubscription {
    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().watches.remove(&self.id);
        }
    }
}

impl Notifier for MemoryFs {
    fn subscribe(
        &self,
        path: &Path,
        sink: RawSink,
    ) -> Result<Box<dyn Subscription>, PlatformError> {
        let mut inner = self.inner.lock();
        inner.subscribe_log.push((path.to_path_buf(), Instant::now()));

        if let Some(code) = inner.take_failure(Op::Subscribe, path) {
            return Err(PlatformError::new(code, path, "injected subscribe failure"));
        }
        if !inner.nodes.contains_key(path) {
            return Err(PlatformError::not_found(path));
        }

        let id = inner.next_watch;
        inner.next_watch += 1;
        inner.watches.insert(
            id,
            Watch {
                path: path.to_path_buf(),
                sink,
            },
        );

        Ok(Box::new(MemorySubscription {
            id,
            path: path.to_path_buf(),
            inner: Arc::downgrade(&self.inner),
        }))
    }
}

#[async_trait]
impl FileSystem for MemoryFs {
    async fn list(&self, path: &Path) -> Result<Vec<String>, PlatformError> {
        self.list_now(path)
    }

    async fn stat(&self, path: &Path) -> Result<EntryStat, PlatformError> {
        self.stat_now(path)
    }
}
