use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use cas_types::{Link, ObjectHash, ObjectType};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, MetaEntry, MetaStore};

// ---------------------------------------------------------------------------
// InMemoryMetaStore
// ---------------------------------------------------------------------------

/// In-memory, HashMap-based metadata store.
///
/// Entries are keyed by [`ObjectHash::to_key`]. Per-key locks are a set of
/// held keys guarded by a mutex; waiters park on a condition variable and
/// are woken whenever any key is released.
pub struct InMemoryMetaStore {
    entries: RwLock<HashMap<String, MetaEntry>>,
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Number of keys currently locked.
    pub fn locked_count(&self) -> usize {
        self.held.lock().expect("lock poisoned").len()
    }

    /// Returns `true` if `primary` is currently locked.
    pub fn is_locked(&self, primary: &ObjectHash) -> bool {
        self.held
            .lock()
            .expect("lock poisoned")
            .contains(&primary.to_key())
    }
}

impl Default for InMemoryMetaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaStore for InMemoryMetaStore {
    fn find(&self, primary: &ObjectHash) -> StoreResult<Option<MetaEntry>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(&primary.to_key()).cloned())
    }

    fn create_if_absent(
        &self,
        primary: &ObjectHash,
        secondary: &ObjectHash,
        object_type: ObjectType,
    ) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        let key = primary.to_key();
        if map.contains_key(&key) {
            return Ok(false);
        }
        map.insert(
            key,
            MetaEntry {
                primary_hash: *primary,
                secondary_hash: *secondary,
                object_type,
                media_type: None,
            },
        );
        Ok(true)
    }

    fn update_media_type(&self, primary: &ObjectHash, media_type: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        match map.get_mut(&primary.to_key()) {
            Some(entry) => {
                entry.media_type = Some(media_type.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, primary: &ObjectHash) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(&primary.to_key()).is_some())
    }

    fn lock(&self, primary: &ObjectHash, timeout: Option<Duration>) -> StoreResult<()> {
        let key = primary.to_key();
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut held = self.held.lock().expect("lock poisoned");
        while held.contains(&key) {
            held = match deadline {
                None => self.released.wait(held).expect("lock poisoned"),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(StoreError::LockTimeout(*primary));
                    }
                    self.released
                        .wait_timeout(held, deadline - now)
                        .expect("lock poisoned")
                        .0
                }
            };
        }
        held.insert(key);
        Ok(())
    }

    fn unlock(&self, primary: &ObjectHash) -> StoreResult<()> {
        let mut held = self.held.lock().expect("lock poisoned");
        held.remove(&primary.to_key());
        drop(held);
        self.released.notify_all();
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryMetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryMetaStore")
            .field("entry_count", &self.len())
            .field("locked_count", &self.locked_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// InMemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory blob store for tests and embedding.
///
/// Counts every call to [`BlobStore::write`], including idempotent
/// rewrites, so tests can assert how many byte writes actually happened.
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<(ObjectType, ObjectHash), Vec<u8>>>,
    writes: AtomicU64,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Number of `write` calls served.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }

    /// Remove all blobs, leaving the write counter alone.
    pub fn clear(&self) {
        self.blobs.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn exists(&self, link: &Link) -> StoreResult<bool> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.contains_key(&(link.object_type, link.primary_hash)))
    }

    fn write(&self, link: &Link, bytes: &[u8]) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut map = self.blobs.write().expect("lock poisoned");
        map.insert((link.object_type, link.primary_hash), bytes.to_vec());
        Ok(())
    }

    fn read(&self, link: &Link) -> StoreResult<Option<Vec<u8>>> {
        let map = self.blobs.read().expect("lock poisoned");
        Ok(map.get(&(link.object_type, link.primary_hash)).cloned())
    }

    fn delete(&self, link: &Link) -> StoreResult<bool> {
        let mut map = self.blobs.write().expect("lock poisoned");
        Ok(map.remove(&(link.object_type, link.primary_hash)).is_some())
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .field("write_count", &self.write_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    fn hash(byte: u8) -> ObjectHash {
        ObjectHash::from_hash([byte; 32])
    }

    fn blob_link(byte: u8) -> Link {
        Link::new(ObjectType::Blob, hash(byte), "")
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    #[test]
    fn create_then_find() {
        let meta = InMemoryMetaStore::new();
        assert!(meta.find(&hash(1)).unwrap().is_none());
        assert!(meta.create_if_absent(&hash(1), &hash(2), ObjectType::Blob).unwrap());

        let entry = meta.find(&hash(1)).unwrap().expect("should exist");
        assert_eq!(entry.secondary_hash, hash(2));
        assert_eq!(entry.object_type, ObjectType::Blob);
        assert!(entry.media_type.is_none());
    }

    #[test]
    fn create_if_absent_never_overwrites() {
        let meta = InMemoryMetaStore::new();
        assert!(meta.create_if_absent(&hash(1), &hash(2), ObjectType::Blob).unwrap());
        assert!(!meta.create_if_absent(&hash(1), &hash(3), ObjectType::List).unwrap());
        let entry = meta.find(&hash(1)).unwrap().unwrap();
        assert_eq!(entry.secondary_hash, hash(2));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn update_media_type() {
        let meta = InMemoryMetaStore::new();
        assert!(!meta.update_media_type(&hash(1), "text/plain").unwrap());
        meta.create_if_absent(&hash(1), &hash(2), ObjectType::List).unwrap();
        assert!(meta.update_media_type(&hash(1), "text/plain").unwrap());
        assert!(meta.update_media_type(&hash(1), "image/png").unwrap());
        let entry = meta.find(&hash(1)).unwrap().unwrap();
        assert_eq!(entry.media_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn delete_entry() {
        let meta = InMemoryMetaStore::new();
        meta.create_if_absent(&hash(1), &hash(2), ObjectType::Blob).unwrap();
        assert!(meta.delete(&hash(1)).unwrap());
        assert!(!meta.delete(&hash(1)).unwrap());
        assert!(meta.is_empty());
    }

    // -----------------------------------------------------------------------
    // Locking
    // -----------------------------------------------------------------------

    #[test]
    fn lock_and_unlock() {
        let meta = InMemoryMetaStore::new();
        meta.lock(&hash(1), None).unwrap();
        assert!(meta.is_locked(&hash(1)));
        assert!(!meta.is_locked(&hash(2)));
        meta.unlock(&hash(1)).unwrap();
        assert_eq!(meta.locked_count(), 0);
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let meta = InMemoryMetaStore::new();
        meta.lock(&hash(1), None).unwrap();
        meta.lock(&hash(2), Some(Duration::from_millis(10))).unwrap();
        assert_eq!(meta.locked_count(), 2);
    }

    #[test]
    fn held_key_times_out() {
        let meta = InMemoryMetaStore::new();
        meta.lock(&hash(1), None).unwrap();
        let err = meta.lock(&hash(1), Some(Duration::from_millis(20))).unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(h) if h == hash(1)));
    }

    #[test]
    fn waiter_proceeds_after_unlock() {
        let meta = Arc::new(InMemoryMetaStore::new());
        meta.lock(&hash(1), None).unwrap();
        let acquired = Arc::new(AtomicBool::new(false));

        let waiter = {
            let meta = Arc::clone(&meta);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                meta.lock(&hash(1), None).unwrap();
                acquired.store(true, Ordering::SeqCst);
                meta.unlock(&hash(1)).unwrap();
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        meta.unlock(&hash(1)).unwrap();
        waiter.join().expect("thread should not panic");
        assert!(acquired.load(Ordering::SeqCst));
    }

    // -----------------------------------------------------------------------
    // Blobs
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read_blob() {
        let blobs = InMemoryBlobStore::new();
        blobs.write(&blob_link(1), b"hello").unwrap();
        assert!(blobs.exists(&blob_link(1)).unwrap());
        assert_eq!(blobs.read(&blob_link(1)).unwrap().unwrap(), b"hello");
        assert_eq!(blobs.total_bytes(), 5);
    }

    #[test]
    fn blobs_are_keyed_by_type_and_hash() {
        let blobs = InMemoryBlobStore::new();
        blobs.write(&blob_link(1), b"x").unwrap();
        let list = Link::new(ObjectType::List, hash(1), "");
        assert!(!blobs.exists(&list).unwrap());
        assert!(blobs.read(&list).unwrap().is_none());
    }

    #[test]
    fn writes_are_counted_even_when_idempotent() {
        let blobs = InMemoryBlobStore::new();
        blobs.write(&blob_link(1), b"x").unwrap();
        blobs.write(&blob_link(1), b"x").unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs.write_count(), 2);
    }

    #[test]
    fn delete_blob() {
        let blobs = InMemoryBlobStore::new();
        blobs.write(&blob_link(1), b"x").unwrap();
        assert!(blobs.delete(&blob_link(1)).unwrap());
        assert!(!blobs.delete(&blob_link(1)).unwrap());
        assert!(blobs.is_empty());
    }

    #[test]
    fn debug_format() {
        let blobs = InMemoryBlobStore::new();
        blobs.write(&blob_link(1), b"x").unwrap();
        let debug = format!("{blobs:?}");
        assert!(debug.contains("InMemoryBlobStore"));
        assert!(debug.contains("write_count"));
        assert!(format!("{:?}", InMemoryMetaStore::new()).contains("entry_count"));
    }
}
