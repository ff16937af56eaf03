use std::time::Duration;

use cas_types::{Link, ObjectHash, ObjectType};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Metadata for one distinct piece of content, keyed by primary hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub primary_hash: ObjectHash,
    pub secondary_hash: ObjectHash,
    pub object_type: ObjectType,
    pub media_type: Option<String>,
}

/// Keyed metadata service with per-key mutual exclusion.
///
/// All implementations must satisfy these invariants:
/// - A primary hash maps to at most one entry, and that entry's secondary
///   hash never changes.
/// - `lock` blocks until the caller holds the key exclusively; the lock is
///   keyed by hash value alone, not by object type.
/// - Every mutation of an entry happens under its key's lock. The lock is
///   the only serialization mechanism; no transaction isolation is assumed.
pub trait MetaStore: Send + Sync {
    /// Look up the entry for `primary`.
    fn find(&self, primary: &ObjectHash) -> StoreResult<Option<MetaEntry>>;

    /// Create an entry unless one exists. Returns `true` if created.
    fn create_if_absent(
        &self,
        primary: &ObjectHash,
        secondary: &ObjectHash,
        object_type: ObjectType,
    ) -> StoreResult<bool>;

    /// Attach or replace the media type. Returns `false` if no entry exists.
    fn update_media_type(&self, primary: &ObjectHash, media_type: &str) -> StoreResult<bool>;

    /// Remove an entry. Returns `true` if it existed.
    ///
    /// Unsafe with respect to concurrent writers of the same content: the
    /// caller must guarantee no write of `primary` is in flight.
    fn delete(&self, primary: &ObjectHash) -> StoreResult<bool>;

    /// Acquire the exclusive lock for `primary`, waiting at most `timeout`
    /// when one is given.
    fn lock(&self, primary: &ObjectHash, timeout: Option<Duration>) -> StoreResult<()>;

    /// Release the lock for `primary`.
    fn unlock(&self, primary: &ObjectHash) -> StoreResult<()>;
}

/// Content-addressed byte storage.
///
/// Content is addressed by `(object_type, primary_hash)`. Implementations
/// must accept concurrent writes to different keys, and writing the same
/// bytes to the same key twice must be harmless.
pub trait BlobStore: Send + Sync {
    /// Check whether bytes are stored for `link`.
    fn exists(&self, link: &Link) -> StoreResult<bool>;

    /// Store `bytes` under `link`.
    ///
    /// Failures are reported as [`StoreError::WriteIo`](crate::StoreError::WriteIo)
    /// tagged with the link's type and hash.
    fn write(&self, link: &Link, bytes: &[u8]) -> StoreResult<()>;

    /// Read the bytes stored under `link`.
    ///
    /// Returns `Ok(None)` if nothing is stored.
    fn read(&self, link: &Link) -> StoreResult<Option<Vec<u8>>>;

    /// Delete the bytes stored under `link`. Returns `true` if they existed.
    fn delete(&self, link: &Link) -> StoreResult<bool>;
}
