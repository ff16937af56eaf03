//! Content-addressed object storage with write-time deduplication.
//!
//! Every object (blob, list, tree, commit) is stored once under the hash of
//! its canonical encoding. A second, independent hash is recorded next to
//! the first so that a primary-hash collision is detected instead of
//! silently aliasing two different objects.
//!
//! # Object Types
//!
//! - [`Blob`] -- one chunk of raw content
//! - [`List`] -- ordered links forming a chunked stream
//! - [`Tree`] -- named links to other objects
//! - [`Commit`] -- a snapshot of a tree with an optional parent
//!
//! # Storage Backends
//!
//! Metadata lives behind [`MetaStore`], bytes behind [`BlobStore`]:
//!
//! - [`InMemoryMetaStore`] / [`InMemoryBlobStore`] -- for tests and embedding
//! - [`FsBlobStore`] -- one file per object under a directory root
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written.
//! 2. Metadata is created under the per-hash lock before bytes are written.
//! 3. The per-hash lock is held until the byte write finishes or is cancelled.
//! 4. Writes of distinct content proceed in parallel, bounded by a permit pool.
//! 5. I/O failures name the object type and hash they concern.

pub mod error;
pub mod fs;
pub mod lock;
pub mod memory;
pub mod object;
pub mod reader;
pub mod traits;
pub mod writer;

pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use lock::KeyGuard;
pub use memory::{InMemoryBlobStore, InMemoryMetaStore};
pub use object::{Blob, Commit, List, Object, Tree};
pub use reader::{load_object, StreamReader};
pub use traits::{BlobStore, MetaEntry, MetaStore};
pub use writer::{Completion, DedupWriter, WriteHandle, WriteOutcome};
