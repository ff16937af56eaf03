use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use cas_chunk::{ChunkConfig, Chunker};
use cas_dag::GraphResolver;
use cas_store::{
    load_object, BlobStore, Commit, DedupWriter, FsBlobStore, InMemoryBlobStore,
    InMemoryMetaStore, MetaStore, Object, StoreError, StreamReader, Tree, WriteHandle,
};
use cas_types::{Link, ObjectHash};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{SdkError, SdkResult};
use crate::packer::{PackSummary, Packer};

/// Whether the bytes behind a metadata entry are present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageStatus {
    Stored,
    /// Metadata exists but the blob store has no bytes. The next write of
    /// the same content rewrites them.
    MissingBytes,
}

/// Answer to [`ContentStore::probe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResult {
    /// Unnamed link to the content.
    pub link: Link,
    pub media_type: Option<String>,
    pub status: StorageStatus,
}

/// A chunked stream opened for reading.
#[derive(Debug)]
pub struct ChunkedRead {
    pub media_type: Option<String>,
    pub stream: StreamReader,
}

/// High-level content store API.
///
/// Write methods block on per-hash locks and return once every write of
/// the call has been scheduled; the returned [`WriteHandle`]'s completion
/// resolves when the bytes are durable. Call them from plain threads or
/// `spawn_blocking`, never from an async task: the byte writes themselves
/// run on the runtime passed at construction.
pub struct ContentStore {
    config: StoreConfig,
    meta: Arc<dyn MetaStore>,
    blobs: Arc<dyn BlobStore>,
    writer: DedupWriter,
    resolver: GraphResolver,
}

impl ContentStore {
    /// Assemble a store over the given metadata and blob backends.
    pub fn new(
        config: StoreConfig,
        meta: Arc<dyn MetaStore>,
        blobs: Arc<dyn BlobStore>,
        runtime: Handle,
    ) -> SdkResult<Self> {
        config.validate()?;
        let writer = DedupWriter::new(
            Arc::clone(&meta),
            Arc::clone(&blobs),
            config.hash_engine()?,
            runtime,
            config.max_in_flight_writes,
        )
        .with_lock_timeout(config.lock_timeout());
        let resolver = GraphResolver::new(Arc::clone(&blobs)).with_max_depth(config.max_resolve_depth);

        info!(
            primary = %config.primary_hash,
            secondary = %config.secondary_hash,
            list_length = config.list_length,
            chunker = %config.chunking.kind,
            "content store ready"
        );
        Ok(Self {
            config,
            meta,
            blobs,
            writer,
            resolver,
        })
    }

    /// A store held entirely in memory.
    pub fn in_memory(config: StoreConfig, runtime: Handle) -> SdkResult<Self> {
        Self::new(
            config,
            Arc::new(InMemoryMetaStore::new()),
            Arc::new(InMemoryBlobStore::new()),
            runtime,
        )
    }

    /// Object bytes under `root` on disk, metadata in memory.
    pub fn open_dir(root: impl AsRef<Path>, config: StoreConfig, runtime: Handle) -> SdkResult<Self> {
        let blobs = FsBlobStore::open(root.as_ref())?;
        Self::new(config, Arc::new(InMemoryMetaStore::new()), Arc::new(blobs), runtime)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn writer(&self) -> &DedupWriter {
        &self.writer
    }

    pub fn meta(&self) -> &Arc<dyn MetaStore> {
        &self.meta
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    // ---- Chunked streams ----

    /// Chunk `source`, store every chunk and pack the links into a List
    /// DAG. The root link carries `name`; `media_type` is recorded on the
    /// root's metadata.
    ///
    /// A chunking or hashing failure stops the pack; chunks already
    /// scheduled still land and will be deduplicated on retry.
    pub fn write_chunked_stream<R: Read>(
        &self,
        name: &str,
        media_type: Option<&str>,
        source: R,
        chunk_config: &ChunkConfig,
    ) -> SdkResult<WriteHandle> {
        let (handle, _) = self.pack_stream(name, media_type, source, chunk_config)?;
        Ok(handle)
    }

    /// [`write_chunked_stream`](Self::write_chunked_stream) with the
    /// configured chunker.
    pub fn write_stream<R: Read>(
        &self,
        name: &str,
        media_type: Option<&str>,
        source: R,
    ) -> SdkResult<WriteHandle> {
        let config = self.config.chunking.clone();
        self.write_chunked_stream(name, media_type, source, &config)
    }

    /// Like [`write_chunked_stream`](Self::write_chunked_stream), also
    /// reporting what the pack produced.
    pub fn pack_stream<R: Read>(
        &self,
        name: &str,
        media_type: Option<&str>,
        source: R,
        chunk_config: &ChunkConfig,
    ) -> SdkResult<(WriteHandle, PackSummary)> {
        let chunker = Chunker::new(source, chunk_config.clone())?;
        let mut packer = Packer::new(&self.writer, self.config.list_length);
        for chunk in chunker {
            packer.push_chunk(chunk?)?;
        }
        packer.finish(name, media_type)
    }

    /// Open the stream rooted at `link` together with its media type.
    pub fn read_chunked(&self, link: &Link) -> SdkResult<ChunkedRead> {
        let entry = self
            .meta
            .find(&link.primary_hash)?
            .ok_or(StoreError::NotFound(link.primary_hash))?;
        let stream = StreamReader::open(Arc::clone(&self.blobs), link)?;
        Ok(ChunkedRead {
            media_type: entry.media_type,
            stream,
        })
    }

    /// Read a whole chunked stream into memory.
    pub fn read_to_vec(&self, link: &Link) -> SdkResult<Vec<u8>> {
        Ok(self.read_chunked(link)?.stream.read_to_vec()?)
    }

    // ---- Trees and commits ----

    pub fn write_tree(&self, name: &str, links: Vec<Link>) -> SdkResult<WriteHandle> {
        Ok(self.writer.write(name, &Object::from(Tree::new(links)))?)
    }

    /// Write a commit of `content` by `author`. A `None` parent starts a new
    /// history.
    pub fn write_commit(
        &self,
        name: &str,
        unix_timestamp: i64,
        message: &str,
        parent: Option<Link>,
        content: Link,
        author: Link,
    ) -> SdkResult<WriteHandle> {
        let commit = Commit::new(unix_timestamp, message, parent, content, author);
        Ok(self.writer.write(name, &Object::from(commit))?)
    }

    pub fn read_object(&self, link: &Link) -> SdkResult<Object> {
        Ok(load_object(self.blobs.as_ref(), link)?)
    }

    pub fn read_tree(&self, link: &Link) -> SdkResult<Tree> {
        match self.read_object(link)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(wrong_type(link, &other)),
        }
    }

    pub fn read_commit(&self, link: &Link) -> SdkResult<Commit> {
        match self.read_object(link)? {
            Object::Commit(commit) => Ok(commit),
            other => Err(wrong_type(link, &other)),
        }
    }

    // ---- Graph and metadata ----

    /// Every link reachable from `link`, `link` first.
    pub fn resolve(&self, link: &Link, include_history: bool) -> SdkResult<Vec<Link>> {
        Ok(self.resolver.resolve(link, include_history)?)
    }

    /// Look up content by primary hash.
    pub fn probe(&self, primary: &ObjectHash) -> SdkResult<Option<ProbeResult>> {
        let Some(entry) = self.meta.find(primary)? else {
            return Ok(None);
        };
        let link = Link::new(entry.object_type, entry.primary_hash, "");
        let status = if self.blobs.exists(&link)? {
            StorageStatus::Stored
        } else {
            StorageStatus::MissingBytes
        };
        Ok(Some(ProbeResult {
            link,
            media_type: entry.media_type,
            status,
        }))
    }

    /// Record `media_type` for the content behind `link`. Returns `false` if
    /// the content is unknown.
    pub fn set_media_type(&self, link: &Link, media_type: &str) -> SdkResult<bool> {
        Ok(self.writer.set_media_type(&link.primary_hash, media_type)?)
    }

    /// Re-read the bytes behind `link` and check them against both hashes.
    pub fn verify(&self, link: &Link) -> SdkResult<()> {
        let bytes = self
            .blobs
            .read(link)?
            .ok_or(StoreError::NotFound(link.primary_hash))?;
        let digest = self.writer.engine().digest(&bytes);
        let mismatch = |reason: String| {
            SdkError::Store(StoreError::HashMismatch {
                hash: link.primary_hash,
                reason,
            })
        };

        if digest.primary != link.primary_hash {
            return Err(mismatch(format!("bytes hash to {}", digest.primary)));
        }
        let entry = self
            .meta
            .find(&link.primary_hash)?
            .ok_or_else(|| mismatch("no metadata entry".into()))?;
        if entry.secondary_hash != digest.secondary {
            return Err(mismatch(format!(
                "secondary hash is {}, metadata records {}",
                digest.secondary, entry.secondary_hash
            )));
        }
        if entry.object_type != link.object_type {
            return Err(mismatch(format!(
                "metadata records a {}, link says {}",
                entry.object_type, link.object_type
            )));
        }
        Object::decode_for(link, &bytes)?;
        debug!(hash = %link.primary_hash.short_hex(), object_type = %link.object_type, "verified");
        Ok(())
    }

    /// Remove the bytes and metadata behind `link`.
    ///
    /// Nothing checks whether other objects still reference the content,
    /// and a concurrent writer of the same content may believe it is still
    /// stored. Only use this when no such writer can exist.
    pub fn delete_unchecked(&self, link: &Link) -> SdkResult<bool> {
        Ok(self.writer.delete_unchecked(link)?)
    }
}

fn wrong_type(link: &Link, found: &Object) -> SdkError {
    SdkError::Store(StoreError::Corrupt {
        hash: link.primary_hash,
        reason: format!("expected {}, found {}", link.object_type, found.object_type()),
    })
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("config", &self.config)
            .field("writer", &self.writer)
            .field("resolver", &self.resolver)
            .finish()
    }
}
