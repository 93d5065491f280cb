//! Path-keyed cache of parsed planes with single-flight parsing.
//!
//! Lookups go to the shared [`PlaneStore`] first. On a miss, callers for the
//! same path meet on one pending cell: the first runs the parse, the rest
//! block on the cell and share its outcome. Only successes are published.

mod source;
mod store;

pub use source::{FitsSource, PlaneSource};
pub use store::{MemoryStore, PlaneSet, PlaneStore};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use crate::error::Result;

type Pending = Arc<OnceLock<Result<PlaneSet>>>;

pub struct FitsCache {
    store: Arc<dyn PlaneStore>,
    source: Arc<dyn PlaneSource>,
    pending: Mutex<HashMap<PathBuf, Pending>>,
    /// Planes whose file is still being written in the background.
    staged: Mutex<HashMap<PathBuf, PlaneSet>>,
}

impl FitsCache {
    pub fn new(store: Arc<dyn PlaneStore>, source: Arc<dyn PlaneSource>) -> Self {
        Self {
            store,
            source,
            pending: Mutex::new(HashMap::new()),
            staged: Mutex::new(HashMap::new()),
        }
    }

    /// Planes for `path`, parsing the file at most once however many
    /// callers ask for it concurrently.
    pub fn get_or_parse(&self, path: &Path) -> Result<PlaneSet> {
        let key = normalize(path);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }

        let cell = {
            let mut pending = lock(&self.pending);
            Arc::clone(pending.entry(key.clone()).or_default())
        };

        let outcome = cell
            .get_or_init(|| {
                // Another caller may have published while we waited for the lock.
                if let Some(hit) = self.lookup(&key) {
                    return Ok(hit);
                }
                debug!(path = %key.display(), "cache miss, parsing");
                let planes: PlaneSet = self
                    .source
                    .parse(&key)?
                    .into_iter()
                    .map(Arc::new)
                    .collect::<Vec<_>>()
                    .into();
                self.store.put(key.clone(), Arc::clone(&planes));
                Ok(planes)
            })
            .clone();

        let mut pending = lock(&self.pending);
        if pending.get(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            pending.remove(&key);
        }
        outcome
    }

    /// Publish planes for a file that has just been written.
    pub fn register(&self, path: &Path, planes: PlaneSet) {
        let key = normalize(path);
        debug!(path = %key.display(), "registering planes");
        self.store.put(key.clone(), planes);
        lock(&self.staged).remove(&key);
    }

    /// Serve `planes` for `path` until its background write lands.
    pub fn stage(&self, path: &Path, planes: PlaneSet) {
        lock(&self.staged).insert(normalize(path), planes);
    }

    pub fn unstage(&self, path: &Path) {
        lock(&self.staged).remove(&normalize(path));
    }

    pub fn evict(&self, path: &Path) {
        let key = normalize(path);
        self.store.remove(&key);
        lock(&self.staged).remove(&key);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lookup(&normalize(path)).is_some()
    }

    /// Number of parses currently in flight.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    fn lookup(&self, key: &Path) -> Option<PlaneSet> {
        if let Some(hit) = self.store.get(key) {
            // Entries whose file has gone away are stale.
            if key.exists() {
                debug!(path = %key.display(), "cache hit");
                return Some(hit);
            }
            debug!(path = %key.display(), "cached file no longer exists");
            self.store.remove(key);
        }
        lock(&self.staged).get(key).cloned()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canonical form of `path`. Files that do not exist yet keep their name
/// under a canonical parent directory.
pub fn normalize(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}
