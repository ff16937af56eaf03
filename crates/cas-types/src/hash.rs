use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Width in bytes of every hash the store produces.
pub const HASH_LEN: usize = 32;

/// Content hash of a stored object.
///
/// The same type carries both the primary (addressing) hash and the secondary
/// (verification) hash; which one a value is depends only on where it is
/// used. The all-zero value is reserved as the "no object" sentinel, e.g. for
/// the parent link of a root commit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHash([u8; HASH_LEN]);

impl ObjectHash {
    /// Wrap a pre-computed digest.
    pub const fn from_hash(hash: [u8; HASH_LEN]) -> Self {
        Self(hash)
    }

    /// Build from a digest slice, rejecting anything that is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != HASH_LEN {
            return Err(TypeError::InvalidLength {
                expected: HASH_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// The null hash (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self([0u8; HASH_LEN])
    }

    /// Returns `true` if this is the null hash.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters), for logs.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Stable key used by metadata backends.
    ///
    /// Lowercase hex is a bijection over the digest bytes, so two distinct
    /// hashes can never share a key.
    pub fn to_key(&self) -> String {
        self.to_hex()
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.short_hex())
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; HASH_LEN]> for ObjectHash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectHash> for [u8; HASH_LEN] {
    fn from(hash: ObjectHash) -> Self {
        hash.0
    }
}
