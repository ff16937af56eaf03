//! Error types for graph resolution.

use cas_store::StoreError;
use cas_types::Link;

/// Errors that can occur while resolving the object graph.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A referenced object could not be loaded. Fatal for the whole call.
    #[error("failed to load {} {}: {source}", .link.object_type, .link.primary_hash)]
    Resolution {
        /// The link whose object failed to load.
        link: Link,
        #[source]
        source: StoreError,
    },

    /// Nesting of lists and trees exceeded the configured limit.
    #[error("graph deeper than {limit} levels below {root}")]
    DepthExceeded {
        /// The link resolution started from.
        root: Link,
        /// The configured maximum depth.
        limit: usize,
    },

    /// Backend failure outside of loading a specific object.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
