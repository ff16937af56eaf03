use cas_types::{ObjectHash, ObjectType};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object or metadata entry exists for the hash.
    #[error("object not found: {0}")]
    NotFound(ObjectHash),

    /// Same primary hash, different secondary hash. Never resolved
    /// automatically; the existing entry is left untouched.
    #[error("hash collision on {primary}: stored secondary {existing}, incoming secondary {incoming}")]
    HashCollision {
        primary: ObjectHash,
        existing: ObjectHash,
        incoming: ObjectHash,
    },

    /// Metadata claims the object exists but the blob store has no bytes.
    #[error("store inconsistency: metadata for {object_type} {hash} has no stored bytes")]
    StoreInconsistency {
        object_type: ObjectType,
        hash: ObjectHash,
    },

    /// Writing object bytes failed.
    #[error("failed to write {object_type} {hash}: {source}")]
    WriteIo {
        object_type: ObjectType,
        hash: ObjectHash,
        #[source]
        source: std::io::Error,
    },

    /// Reading object bytes failed.
    #[error("failed to read {object_type} {hash}: {source}")]
    ReadIo {
        object_type: ObjectType,
        hash: ObjectHash,
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes no longer hash to the expected values.
    #[error("hash mismatch for {hash}: {reason}")]
    HashMismatch { hash: ObjectHash, reason: String },

    /// The object data is malformed or has the wrong type.
    #[error("corrupt object {hash}: {reason}")]
    Corrupt { hash: ObjectHash, reason: String },

    /// Only Blob and List links can be streamed.
    #[error("cannot stream a {0} object")]
    NotStreamable(ObjectType),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The per-hash lock could not be acquired in time.
    #[error("timed out waiting for lock on {0}")]
    LockTimeout(ObjectHash),

    /// A scheduled write was cancelled before it reported a result.
    #[error("write of {0} was cancelled")]
    Cancelled(ObjectHash),

    /// Metadata backend failure.
    #[error("metadata backend error: {0}")]
    Backend(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
