//! Foundation types for the content-addressed store.
//!
//! Every other `cas-*` crate depends on `cas-types`.
//!
//! # Key Types
//!
//! - [`ObjectHash`] — 32-byte content hash (primary or secondary)
//! - [`ObjectType`] — Blob, List, Tree or Commit
//! - [`Link`] — typed, named reference to an object by primary hash

pub mod error;
pub mod hash;
pub mod link;

pub use error::TypeError;
pub use hash::{ObjectHash, HASH_LEN};
pub use link::{Link, ObjectType};
