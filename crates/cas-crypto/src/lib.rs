//! Hashing for the content-addressed store.
//!
//! Provides the [`HashEngine`], which computes the primary (addressing) and
//! secondary (verification) hash of canonical object bytes. All crypto
//! operations wrap established libraries -- no custom cryptography.

pub mod hasher;

pub use hasher::{ContentDigest, HashAlgorithm, HashEngine, HasherError, ObjectDigest};
