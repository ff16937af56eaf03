//! Content-defined chunking for the content-addressed store.
//!
//! A [`Chunker`] splits a byte stream into variable-size chunks at
//! content-determined boundaries, so a small edit to a file only changes the
//! chunks around the edit. Three modes are available:
//!
//! - [`ChunkerKind::RabinKarp`] -- polynomial rolling hash ([`RabinKarp`])
//! - [`ChunkerKind::BuzHash`] -- table-driven cyclic hash ([`BuzHash`])
//! - [`ChunkerKind::Fixed`] -- plain fixed-size blocks
//!
//! All modes share one contract: the emitted chunks, concatenated in order,
//! are the source bytes, and the same input under the same configuration
//! always produces the same boundaries.

pub mod chunker;
pub mod config;
pub mod error;
pub mod rolling;

pub use chunker::{digest, Chunker};
pub use config::{ChunkConfig, ChunkerKind};
pub use error::{ChunkError, ChunkResult};
pub use rolling::{BuzHash, RabinKarp, RollingHash, BUZHASH_TABLE, RABIN_KARP_PRIME};
