//! Packing a chunk sequence into a bounded fan-out List DAG.
//!
//! Chunks become Blobs as they arrive. [`Packer::finish`] then groups the
//! chunk links into Lists of at most `list_length` children, writes them,
//! and repeats on the list links until a single root remains. Internal
//! objects carry empty names so identical content deduplicates regardless
//! of what the caller called the stream; only the root carries a name.

use cas_store::{Blob, Completion, DedupWriter, List, Object, WriteHandle, WriteOutcome};
use cas_types::Link;
use tracing::info;

use crate::error::SdkResult;

/// What a pack produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackSummary {
    /// Chunk Blobs in the stream.
    pub chunks: usize,
    /// List objects written, root included.
    pub lists: usize,
    /// Levels of Lists above the chunks.
    pub levels: usize,
    /// Objects whose bytes were (re)written.
    pub written: usize,
    /// Objects skipped because they were already stored.
    pub deduplicated: usize,
    /// Total payload bytes across chunks.
    pub bytes: u64,
}

/// Incremental builder for one chunked stream.
pub struct Packer<'a> {
    writer: &'a DedupWriter,
    list_length: usize,
    links: Vec<Link>,
    outcomes: Vec<WriteOutcome>,
    completions: Vec<Completion>,
    summary: PackSummary,
}

impl<'a> Packer<'a> {
    /// `list_length` is clamped to at least 2 so packing always terminates.
    pub fn new(writer: &'a DedupWriter, list_length: usize) -> Self {
        Self {
            writer,
            list_length: list_length.max(2),
            links: Vec::new(),
            outcomes: Vec::new(),
            completions: Vec::new(),
            summary: PackSummary::default(),
        }
    }

    /// Write one chunk as a Blob. Returns as soon as the write is scheduled.
    pub fn push_chunk(&mut self, data: Vec<u8>) -> SdkResult<&Link> {
        self.summary.chunks += 1;
        self.summary.bytes += data.len() as u64;
        let handle = self.writer.write("", &Object::from(Blob::new(data)))?;
        Ok(self.track(handle))
    }

    pub fn summary(&self) -> &PackSummary {
        &self.summary
    }

    fn track(&mut self, handle: WriteHandle) -> &Link {
        match handle.outcome {
            WriteOutcome::Deduplicated => self.summary.deduplicated += 1,
            WriteOutcome::Written | WriteOutcome::Healed => self.summary.written += 1,
        }
        self.completions.push(handle.completion);
        self.outcomes.push(handle.outcome);
        self.links.push(handle.link);
        &self.links[self.links.len() - 1]
    }

    /// Build the List levels and return the named root.
    ///
    /// The returned completion covers every object of the stream, so it
    /// resolves only once the whole DAG is durable. A stream with no chunks
    /// packs to a single empty Blob.
    pub fn finish(
        mut self,
        name: &str,
        media_type: Option<&str>,
    ) -> SdkResult<(WriteHandle, PackSummary)> {
        let mut level = std::mem::take(&mut self.links);

        while level.len() > 1 {
            let is_root = level.len() <= self.list_length;
            let mut next = Vec::with_capacity(level.len().div_ceil(self.list_length));
            for group in level.chunks(self.list_length) {
                let list = Object::from(List::new(group.to_vec()));
                let handle = if is_root {
                    self.writer.write_with_media_type(name, &list, media_type)?
                } else {
                    self.writer.write("", &list)?
                };
                self.summary.lists += 1;
                next.push(self.track(handle).clone());
            }
            self.summary.levels += 1;
            level = next;
        }

        let root = match level.pop() {
            Some(list) if self.summary.lists > 0 => list,
            single => {
                // A single chunk is its own root; no chunks at all is one
                // empty chunk.
                let chunk = match single {
                    Some(chunk) => chunk,
                    None => self.push_chunk(Vec::new())?.clone(),
                };
                if let Some(media_type) = media_type {
                    self.writer.set_media_type(&chunk.primary_hash, media_type)?;
                }
                chunk.renamed(name)
            }
        };
        // The root is always the last object tracked.
        let outcome = self.outcomes.last().copied().unwrap_or(WriteOutcome::Written);

        info!(
            root = %root.primary_hash.short_hex(),
            object_type = %root.object_type,
            chunks = self.summary.chunks,
            lists = self.summary.lists,
            levels = self.summary.levels,
            written = self.summary.written,
            deduplicated = self.summary.deduplicated,
            bytes = self.summary.bytes,
            "packed stream"
        );

        let handle = WriteHandle {
            link: root,
            outcome,
            completion: Completion::all(self.completions),
        };
        Ok((handle, self.summary))
    }
}

impl std::fmt::Debug for Packer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packer")
            .field("list_length", &self.list_length)
            .field("pending_links", &self.links.len())
            .field("summary", &self.summary)
            .finish()
    }
}
