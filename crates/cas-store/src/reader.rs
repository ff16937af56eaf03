//! Loading objects and streaming chunked content back.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;

use cas_types::{Link, ObjectType};
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::object::Object;
use crate::traits::BlobStore;

/// Read and decode the object behind `link`.
///
/// Missing bytes are [`StoreError::NotFound`]; bytes of the wrong type or
/// that fail to decode are [`StoreError::Corrupt`].
pub fn load_object(blobs: &dyn BlobStore, link: &Link) -> StoreResult<Object> {
    let bytes = blobs
        .read(link)?
        .ok_or(StoreError::NotFound(link.primary_hash))?;
    Object::decode_for(link, &bytes)
}

/// Sequential reader over a chunked Blob/List structure.
///
/// Yields the concatenated data of every Blob reachable from the root in
/// depth-first, left-to-right order. Objects are loaded lazily, so memory use
/// is bounded by one chunk plus the pending link queue.
pub struct StreamReader {
    blobs: Arc<dyn BlobStore>,
    pending: VecDeque<Link>,
    current: Vec<u8>,
    offset: usize,
    bytes_read: u64,
}

impl StreamReader {
    /// Open a stream rooted at `root`.
    ///
    /// A Blob root streams its own data; a List root streams its children.
    /// Tree and Commit roots are rejected with [`StoreError::NotStreamable`].
    pub fn open(blobs: Arc<dyn BlobStore>, root: &Link) -> StoreResult<Self> {
        let pending = match root.object_type {
            ObjectType::Blob => VecDeque::from([root.clone()]),
            ObjectType::List => match load_object(blobs.as_ref(), root)? {
                Object::List(list) => list.links.into(),
                other => return Err(StoreError::NotStreamable(other.object_type())),
            },
            other => return Err(StoreError::NotStreamable(other)),
        };
        Ok(Self {
            blobs,
            pending,
            current: Vec::new(),
            offset: 0,
            bytes_read: 0,
        })
    }

    /// Bytes handed out so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Drain the remaining stream into a vector.
    pub fn read_to_vec(mut self) -> StoreResult<Vec<u8>> {
        let mut out = Vec::new();
        while self.fill()? {
            out.extend_from_slice(&self.current[self.offset..]);
            self.offset = self.current.len();
        }
        self.bytes_read += out.len() as u64;
        Ok(out)
    }

    /// Make sure `current` has unread bytes. Returns `false` at end of stream.
    fn fill(&mut self) -> StoreResult<bool> {
        while self.offset >= self.current.len() {
            let Some(link) = self.pending.pop_front() else {
                return Ok(false);
            };
            match load_object(self.blobs.as_ref(), &link)? {
                Object::Blob(blob) => {
                    trace!(hash = %link.primary_hash.short_hex(), len = blob.data.len(), "streaming chunk");
                    self.current = blob.data;
                    self.offset = 0;
                }
                Object::List(list) => {
                    for child in list.links.into_iter().rev() {
                        self.pending.push_front(child);
                    }
                }
                other => return Err(StoreError::NotStreamable(other.object_type())),
            }
        }
        Ok(true)
    }
}

/// Keep the underlying kind where there is one, so callers can match on it.
fn into_io_error(error: StoreError) -> io::Error {
    match error {
        StoreError::Io(inner) | StoreError::ReadIo { source: inner, .. } => inner,
        e @ StoreError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, e),
        other => io::Error::other(other),
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let more = self.fill().map_err(into_io_error)?;
        if !more {
            return Ok(0);
        }
        let available = &self.current[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("pending", &self.pending.len())
            .field("buffered", &(self.current.len() - self.offset.min(self.current.len())))
            .field("bytes_read", &self.bytes_read)
            .finish()
    }
}
