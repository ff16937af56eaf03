//! High-level API for the content-addressed store.
//!
//! [`ContentStore`] ties the pieces together: a chunked byte stream is split
//! by [`cas_chunk::Chunker`], each chunk is stored once by the
//! [`cas_store::DedupWriter`], the chunk links are packed into a bounded
//! fan-out List DAG, and trees and commits are written on top. Reads go back
//! through [`cas_store::StreamReader`] and [`cas_dag::GraphResolver`].

pub mod config;
pub mod error;
pub mod packer;
pub mod repository;

pub use config::StoreConfig;
pub use error::{SdkError, SdkResult};
pub use packer::{PackSummary, Packer};
pub use repository::{ChunkedRead, ContentStore, ProbeResult, StorageStatus};

// Re-export key types
pub use cas_chunk::{ChunkConfig, ChunkerKind};
pub use cas_crypto::HashAlgorithm;
pub use cas_store::{Blob, Commit, Completion, List, Object, Tree, WriteHandle, WriteOutcome};
pub use cas_types::{Link, ObjectHash, ObjectType};
