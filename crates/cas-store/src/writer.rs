//! Deduplicating writer.
//!
//! [`DedupWriter::write`] runs the write protocol for one object:
//!
//! 1. encode the object and compute its primary and secondary hash;
//! 2. take the per-primary-hash lock (blocking);
//! 3. consult the [`MetaStore`]:
//!    - no entry: create it while still locked, then write the bytes;
//!    - entry with the same secondary hash and bytes present: skip;
//!    - entry with the same secondary hash but bytes missing: log the
//!      inconsistency and write the bytes again;
//!    - entry with a different secondary hash: fail with
//!      [`StoreError::HashCollision`] and leave the entry untouched;
//! 4. wait for a free write slot, then hand the bytes, the slot and the
//!    lock to the worker pool; both are released when the byte write
//!    finishes or fails, or when it is cancelled;
//! 5. return the [`Link`] immediately together with a [`Completion`].
//!
//! Creating the metadata entry before the bytes land is the dedup
//! guarantee: a concurrent writer of the same content waits on the lock,
//! then finds the entry and the bytes, and skips.

use std::sync::Arc;
use std::time::Duration;

use cas_crypto::HashEngine;
use cas_types::{Link, ObjectHash};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::AbortHandle;
use tracing::{debug, error, warn};

use crate::error::{StoreError, StoreResult};
use crate::lock::KeyGuard;
use crate::object::Object;
use crate::traits::{BlobStore, MetaStore};

/// What the writer decided for one object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New content: metadata created and bytes scheduled.
    Written,
    /// Content already stored: nothing written.
    Deduplicated,
    /// Metadata existed but bytes were missing: bytes rewritten.
    Healed,
}

impl WriteOutcome {
    /// Returns `true` if a byte write was scheduled.
    pub fn wrote_bytes(&self) -> bool {
        !matches!(self, Self::Deduplicated)
    }
}

struct PendingWrite {
    hash: ObjectHash,
    rx: oneshot::Receiver<StoreResult<()>>,
    abort: AbortHandle,
}

/// Awaitable, cancellable result of zero or more scheduled byte writes.
///
/// A completion built with [`Completion::all`] resolves once every part
/// has resolved, and reports the first failure in scheduling order.
#[must_use = "a completion must be awaited before the write is durable"]
pub struct Completion {
    pending: Vec<PendingWrite>,
}

impl Completion {
    /// A completion with nothing outstanding.
    pub fn ready() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Merge several completions into one.
    pub fn all(parts: impl IntoIterator<Item = Completion>) -> Self {
        Self {
            pending: parts.into_iter().flat_map(|c| c.pending).collect(),
        }
    }

    /// Number of byte writes tracked.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if no byte write is tracked.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Cancel every tracked write that has not started yet.
    ///
    /// A write already handed to the blocking pool runs to completion, but
    /// its result is reported as [`StoreError::Cancelled`]. Locks are always
    /// released.
    pub fn cancel(&self) {
        for write in &self.pending {
            write.abort.abort();
        }
    }

    /// Wait asynchronously for every tracked write.
    pub async fn finished(self) -> StoreResult<()> {
        let mut first_error = None;
        for write in self.pending {
            let result = write
                .rx
                .await
                .unwrap_or(Err(StoreError::Cancelled(write.hash)));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Block the current thread until every tracked write resolves.
    ///
    /// Must not be called from within an async runtime; use
    /// [`finished`](Self::finished) there.
    pub fn wait(self) -> StoreResult<()> {
        let mut first_error = None;
        for write in self.pending {
            let result = write
                .rx
                .blocking_recv()
                .unwrap_or(Err(StoreError::Cancelled(write.hash)));
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Result of [`DedupWriter::write`].
#[derive(Debug)]
pub struct WriteHandle {
    pub link: Link,
    pub outcome: WriteOutcome,
    pub completion: Completion,
}

impl WriteHandle {
    /// Block until the write is durable and return the link.
    pub fn wait(self) -> StoreResult<Link> {
        self.completion.wait()?;
        Ok(self.link)
    }
}

/// Hash-addressed writer with per-hash locking.
///
/// Byte writes run on the blocking pool of the given Tokio runtime, at most
/// `max_in_flight` at a time. [`write`](Self::write) itself blocks on the
/// per-hash lock, and on a free write slot once `max_in_flight` writes are
/// outstanding, so call it from a plain thread or from `spawn_blocking`.
#[derive(Clone)]
pub struct DedupWriter {
    meta: Arc<dyn MetaStore>,
    blobs: Arc<dyn BlobStore>,
    engine: HashEngine,
    runtime: Handle,
    permits: Arc<Semaphore>,
    lock_timeout: Option<Duration>,
}

impl DedupWriter {
    pub fn new(
        meta: Arc<dyn MetaStore>,
        blobs: Arc<dyn BlobStore>,
        engine: HashEngine,
        runtime: Handle,
        max_in_flight: usize,
    ) -> Self {
        Self {
            meta,
            blobs,
            engine,
            runtime,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            lock_timeout: None,
        }
    }

    /// Give up waiting for a per-hash lock after `timeout`.
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn meta(&self) -> &Arc<dyn MetaStore> {
        &self.meta
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn engine(&self) -> &HashEngine {
        &self.engine
    }

    /// Take the lock for `primary`, honouring the configured timeout.
    pub fn lock(&self, primary: ObjectHash) -> StoreResult<KeyGuard> {
        KeyGuard::acquire(Arc::clone(&self.meta), primary, self.lock_timeout)
    }

    /// Store `object` under its content hash, skipping the byte write when
    /// identical content is already stored.
    pub fn write(&self, name: &str, object: &Object) -> StoreResult<WriteHandle> {
        self.write_with_media_type(name, object, None)
    }

    /// Like [`write`](Self::write), also recording `media_type` on the
    /// metadata entry while the lock is held.
    pub fn write_with_media_type(
        &self,
        name: &str,
        object: &Object,
        media_type: Option<&str>,
    ) -> StoreResult<WriteHandle> {
        let bytes = object.encode()?;
        let digest = self.engine.digest(&bytes);
        let link = Link::new(object.object_type(), digest.primary, name);

        let guard = self.lock(digest.primary)?;

        let outcome = match self.meta.find(&digest.primary)? {
            None => {
                self.meta
                    .create_if_absent(&digest.primary, &digest.secondary, link.object_type)?;
                WriteOutcome::Written
            }
            Some(entry) if entry.secondary_hash != digest.secondary => {
                error!(
                    hash = %digest.primary,
                    existing = %entry.secondary_hash,
                    incoming = %digest.secondary,
                    object_type = %link.object_type,
                    "primary hash collision"
                );
                return Err(StoreError::HashCollision {
                    primary: digest.primary,
                    existing: entry.secondary_hash,
                    incoming: digest.secondary,
                });
            }
            Some(_) => {
                if self.blobs.exists(&link)? {
                    if let Some(media_type) = media_type {
                        self.meta.update_media_type(&digest.primary, media_type)?;
                    }
                    drop(guard);
                    debug!(hash = %link.primary_hash.short_hex(), object_type = %link.object_type, "already stored, skipping");
                    return Ok(WriteHandle {
                        link,
                        outcome: WriteOutcome::Deduplicated,
                        completion: Completion::ready(),
                    });
                }
                let inconsistency = StoreError::StoreInconsistency {
                    object_type: link.object_type,
                    hash: link.primary_hash,
                };
                warn!(error = %inconsistency, "rewriting missing object bytes");
                WriteOutcome::Healed
            }
        };

        if let Some(media_type) = media_type {
            self.meta.update_media_type(&digest.primary, media_type)?;
        }

        debug!(
            hash = %link.primary_hash.short_hex(),
            object_type = %link.object_type,
            len = bytes.len(),
            ?outcome,
            "scheduling object write"
        );
        let permit = self.write_slot(digest.primary)?;
        let completion = self.schedule(link.clone(), bytes, guard, permit);
        Ok(WriteHandle {
            link,
            outcome,
            completion,
        })
    }

    /// Attach `media_type` to the entry for `primary` under its lock.
    ///
    /// Waits for any in-flight write of the same content. Returns `false` if
    /// no entry exists.
    pub fn set_media_type(&self, primary: &ObjectHash, media_type: &str) -> StoreResult<bool> {
        let _guard = self.lock(*primary)?;
        self.meta.update_media_type(primary, media_type)
    }

    /// Remove the bytes and metadata for `link`.
    ///
    /// Not safe against concurrent writers: a writer that found the entry
    /// before the delete will report the content as stored. Callers must
    /// make sure nothing else references or is writing the object.
    pub fn delete_unchecked(&self, link: &Link) -> StoreResult<bool> {
        let _guard = self.lock(link.primary_hash)?;
        let had_bytes = self.blobs.delete(link)?;
        let had_entry = self.meta.delete(&link.primary_hash)?;
        warn!(hash = %link.primary_hash.short_hex(), object_type = %link.object_type, "deleted object");
        Ok(had_bytes || had_entry)
    }

    /// Block until fewer than `max_in_flight` byte writes are outstanding.
    fn write_slot(&self, primary: ObjectHash) -> StoreResult<OwnedSemaphorePermit> {
        self.runtime
            .block_on(Arc::clone(&self.permits).acquire_owned())
            .map_err(|_| StoreError::Cancelled(primary))
    }

    fn schedule(
        &self,
        link: Link,
        bytes: Vec<u8>,
        guard: KeyGuard,
        permit: OwnedSemaphorePermit,
    ) -> Completion {
        let blobs = Arc::clone(&self.blobs);
        let hash = link.primary_hash;
        let (tx, rx) = oneshot::channel();

        let task = self.runtime.spawn(async move {
            let task_link = link.clone();
            let joined = tokio::task::spawn_blocking(move || {
                let result = blobs.write(&task_link, &bytes);
                drop(guard);
                drop(permit);
                result
            })
            .await;
            let result = match joined {
                Ok(result) => result.map_err(|e| tag_write_error(&link, e)),
                Err(e) => Err(tag_write_error(
                    &link,
                    StoreError::Backend(format!("write task failed: {e}")),
                )),
            };
            if let Err(e) = &result {
                warn!(hash = %hash.short_hex(), error = %e, "object write failed");
            }
            let _ = tx.send(result);
        });

        Completion {
            pending: vec![PendingWrite {
                hash,
                rx,
                abort: task.abort_handle(),
            }],
        }
    }
}

/// Make sure a failed byte write names the object it was writing.
fn tag_write_error(link: &Link, error: StoreError) -> StoreError {
    match error {
        e @ StoreError::WriteIo { .. } => e,
        StoreError::Io(source) => StoreError::WriteIo {
            object_type: link.object_type,
            hash: link.primary_hash,
            source,
        },
        other => StoreError::WriteIo {
            object_type: link.object_type,
            hash: link.primary_hash,
            source: std::io::Error::other(other.to_string()),
        },
    }
}

impl std::fmt::Debug for DedupWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupWriter")
            .field("primary", &self.engine.primary_algorithm())
            .field("secondary", &self.engine.secondary_algorithm())
            .field("available_permits", &self.permits.available_permits())
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}
