use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::plane::ImagePlane;

/// All planes parsed from one file, in file order.
pub type PlaneSet = Arc<[Arc<ImagePlane>]>;

/// Shared storage for parsed plane sets, keyed by normalized file path.
pub trait PlaneStore: Send + Sync {
    fn get(&self, key: &Path) -> Option<PlaneSet>;
    fn put(&self, key: PathBuf, planes: PlaneSet);
    fn remove(&self, key: &Path) -> Option<PlaneSet>;
}

struct Entry {
    planes: PlaneSet,
    bytes: usize,
    inserted: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<PathBuf, Entry>,
    order: VecDeque<PathBuf>,
    bytes: usize,
}

impl Inner {
    fn take(&mut self, key: &Path) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.bytes -= entry.bytes;
        Some(entry)
    }
}

/// In-process store with a byte budget and a time-to-live. The oldest
/// entries are evicted first once the budget is exceeded.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    capacity_bytes: usize,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new(capacity_bytes: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity_bytes,
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> usize {
        self.read().bytes
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlaneStore for MemoryStore {
    fn get(&self, key: &Path) -> Option<PlaneSet> {
        {
            let inner = self.read();
            let entry = inner.entries.get(key)?;
            if entry.inserted.elapsed() <= self.ttl {
                return Some(Arc::clone(&entry.planes));
            }
        }
        debug!(path = %key.display(), "cache entry expired");
        self.write().take(key);
        None
    }

    fn put(&self, key: PathBuf, planes: PlaneSet) {
        let bytes = planes.iter().map(|p| p.byte_size()).sum();
        let mut inner = self.write();
        inner.take(&key);
        while inner.bytes + bytes > self.capacity_bytes {
            let Some(oldest) = inner.order.front().cloned() else {
                break;
            };
            debug!(path = %oldest.display(), "evicting cache entry for space");
            inner.take(&oldest);
        }
        inner.bytes += bytes;
        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            Entry {
                planes,
                bytes,
                inserted: Instant::now(),
            },
        );
    }

    fn remove(&self, key: &Path) -> Option<PlaneSet> {
        self.write().take(key).map(|e| e.planes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::header::FitsHeader;
    use ndarray::Array2;

    fn set(n: usize) -> PlaneSet {
        let plane = ImagePlane::new(Array2::zeros((n, n)), FitsHeader::new()).unwrap();
        vec![Arc::new(plane)].into()
    }

    #[test]
    fn oldest_entry_is_evicted_over_budget() {
        // Each 10x10 set is 400 bytes.
        let store = MemoryStore::new(1000, Duration::from_secs(60));
        store.put("a".into(), set(10));
        store.put("b".into(), set(10));
        store.put("c".into(), set(10));
        assert!(store.get(Path::new("a")).is_none());
        assert!(store.get(Path::new("b")).is_some());
        assert_eq!(store.bytes(), 800);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let store = MemoryStore::new(usize::MAX, Duration::ZERO);
        store.put("a".into(), set(2));
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get(Path::new("a")).is_none());
        assert!(store.is_empty());
    }
}
