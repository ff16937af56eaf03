//! Streaming chunker.
//!
//! [`Chunker`] pulls bytes from any [`Read`] source and yields chunks as an
//! iterator. Each chunk owns its bytes; the rolling window only holds the
//! last `window_size` bytes for hashing, while the chunk itself is collected
//! from the same sequential cursor into its own buffer.
//!
//! # Boundary policy
//!
//! After every cut, fingerprint match or forced at `max_chunk_size`, the
//! window is re-seeded from the next `window_size` bytes. Those bytes count
//! toward the new chunk and are never tested for a boundary, so a chunk
//! boundary depends only on bytes since the previous cut.

use std::io::{ErrorKind, Read};

use tracing::trace;

use crate::config::{ChunkConfig, ChunkerKind};
use crate::error::{ChunkError, ChunkResult};
use crate::rolling::{BuzHash, RabinKarp, RollingHash};

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Seeding the window with the first bytes of a chunk.
    Initializing,
    /// Rolling byte by byte, looking for a boundary.
    Scanning,
    /// Source exhausted and the final chunk emitted.
    Done,
}

enum Roller {
    RabinKarp(RabinKarp),
    BuzHash(BuzHash),
}

impl Roller {
    fn init(&mut self, window: &[u8]) -> u64 {
        match self {
            Self::RabinKarp(h) => h.init(window),
            Self::BuzHash(h) => h.init(window),
        }
    }

    fn roll(&mut self, outgoing: u8, incoming: u8) -> u64 {
        match self {
            Self::RabinKarp(h) => h.roll(outgoing, incoming),
            Self::BuzHash(h) => h.roll(outgoing, incoming),
        }
    }
}

/// Splits a byte stream into chunks.
///
/// Concatenating the yielded chunks in order reproduces the source exactly.
/// An empty source yields exactly one empty chunk. In the rolling modes a
/// non-empty source shorter than `window_size` yields
/// [`ChunkError::InsufficientData`].
pub struct Chunker<R> {
    config: ChunkConfig,
    source: R,
    read_buf: Box<[u8]>,
    read_pos: usize,
    read_len: usize,
    roller: Option<Roller>,
    /// Ring buffer of the last `window_size` bytes.
    window: Vec<u8>,
    window_pos: usize,
    chunk: Vec<u8>,
    state: State,
    bytes_consumed: u64,
    chunks_emitted: u64,
}

impl<R: Read> Chunker<R> {
    /// Create a chunker over `source`. Fails if the configuration is invalid.
    pub fn new(source: R, config: ChunkConfig) -> ChunkResult<Self> {
        config.validate()?;
        let roller = match config.kind {
            ChunkerKind::Fixed => None,
            ChunkerKind::RabinKarp => Some(Roller::RabinKarp(RabinKarp::new())),
            ChunkerKind::BuzHash => Some(Roller::BuzHash(BuzHash::new())),
        };
        let capacity = match config.kind {
            ChunkerKind::Fixed => config.block_size,
            _ => config.min_chunk_size,
        };
        Ok(Self {
            window: vec![0u8; config.window_size],
            config,
            source,
            read_buf: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            read_pos: 0,
            read_len: 0,
            roller,
            window_pos: 0,
            chunk: Vec::with_capacity(capacity),
            state: State::Initializing,
            bytes_consumed: 0,
            chunks_emitted: 0,
        })
    }

    /// The configuration this chunker runs with.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Total bytes read from the source so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Number of chunks yielded so far.
    pub fn chunks_emitted(&self) -> u64 {
        self.chunks_emitted
    }

    fn next_byte(&mut self) -> ChunkResult<Option<u8>> {
        if self.read_pos == self.read_len {
            loop {
                match self.source.read(&mut self.read_buf) {
                    Ok(0) => return Ok(None),
                    Ok(n) => {
                        self.read_pos = 0;
                        self.read_len = n;
                        break;
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        let byte = self.read_buf[self.read_pos];
        self.read_pos += 1;
        self.bytes_consumed += 1;
        Ok(Some(byte))
    }

    /// Read bytes into the current chunk until it holds `len` bytes or the
    /// source ends. Returns `false` on end of source.
    fn fill_chunk_to(&mut self, len: usize) -> ChunkResult<bool> {
        while self.chunk.len() < len {
            match self.next_byte()? {
                Some(byte) => self.chunk.push(byte),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    fn emit(&mut self) -> Vec<u8> {
        self.chunks_emitted += 1;
        let chunk = std::mem::take(&mut self.chunk);
        trace!(
            len = chunk.len(),
            index = self.chunks_emitted - 1,
            offset = self.bytes_consumed - chunk.len() as u64,
            "chunk emitted"
        );
        chunk
    }

    /// Emit whatever is buffered as the final chunk, or nothing if a chunk
    /// has already been emitted and the buffer is empty.
    fn finish(&mut self) -> Option<Vec<u8>> {
        self.state = State::Done;
        if self.chunk.is_empty() && self.chunks_emitted > 0 {
            None
        } else {
            Some(self.emit())
        }
    }

    fn next_fixed(&mut self) -> ChunkResult<Option<Vec<u8>>> {
        let block_size = self.config.block_size;
        if self.fill_chunk_to(block_size)? {
            Ok(Some(self.emit()))
        } else {
            Ok(self.finish())
        }
    }

    fn next_rolling(&mut self) -> ChunkResult<Option<Vec<u8>>> {
        let window_size = self.config.window_size;

        if self.state == State::Initializing {
            if !self.fill_chunk_to(window_size)? {
                if self.chunks_emitted == 0 && !self.chunk.is_empty() {
                    self.state = State::Done;
                    return Err(ChunkError::InsufficientData {
                        available: self.chunk.len(),
                        window_size,
                    });
                }
                return Ok(self.finish());
            }
            self.window.copy_from_slice(&self.chunk[..window_size]);
            self.window_pos = 0;
            if let Some(roller) = self.roller.as_mut() {
                roller.init(&self.window);
            }
            self.state = State::Scanning;
        }

        let min = self.config.min_chunk_size;
        let max = self.config.max_chunk_size;
        let mask = self.config.fingerprint_mask;
        let target = self.config.target_fingerprint;

        loop {
            let Some(incoming) = self.next_byte()? else {
                return Ok(self.finish());
            };
            let outgoing = self.window[self.window_pos];
            self.window[self.window_pos] = incoming;
            self.window_pos = (self.window_pos + 1) % window_size;
            let hash = self
                .roller
                .as_mut()
                .map_or(0, |roller| roller.roll(outgoing, incoming));
            self.chunk.push(incoming);

            let size = self.chunk.len();
            let matched = size >= min && (hash & mask) == target;
            if matched || size >= max {
                if !matched {
                    trace!(size, "forced cut at max_chunk_size");
                }
                self.state = State::Initializing;
                return Ok(Some(self.emit()));
            }
        }
    }
}

impl<R: Read> Iterator for Chunker<R> {
    type Item = ChunkResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Done {
            return None;
        }
        let result = match self.config.kind {
            ChunkerKind::Fixed => self.next_fixed(),
            ChunkerKind::RabinKarp | ChunkerKind::BuzHash => self.next_rolling(),
        };
        match result {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

/// Chunk an in-memory buffer, collecting every chunk.
pub fn digest(data: &[u8], config: &ChunkConfig) -> ChunkResult<Vec<Vec<u8>>> {
    Chunker::new(data, config.clone())?.collect()
}
