//! Graph resolution over the content-addressed object store.
//!
//! [`GraphResolver`] expands a root link into every link reachable from it:
//! list flattening, tree traversal, and commit author/content/parent edges,
//! with history following controlled per call.

pub mod error;
pub mod resolver;

pub use error::{DagError, DagResult};
pub use resolver::{GraphResolver, DEFAULT_MAX_DEPTH};
