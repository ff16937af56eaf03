use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cas_types::ObjectHash;
use serde::{Deserialize, Serialize};

/// A hash function usable for primary or secondary addressing.
///
/// Implementations must be deterministic: the same bytes always produce the
/// same hash, across processes and releases.
pub trait ContentDigest: Send + Sync + fmt::Debug {
    /// Human-readable algorithm name, used in logs and error messages.
    fn algorithm_name(&self) -> &str;

    /// Hash `data` to a 32-byte digest.
    fn digest(&self, data: &[u8]) -> ObjectHash;
}

/// Built-in hash algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "sha3-256")]
    Sha3_256,
    #[serde(rename = "blake3")]
    Blake3,
    #[serde(rename = "sha256")]
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha3_256 => "sha3-256",
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HasherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha3-256" => Ok(Self::Sha3_256),
            "blake3" => Ok(Self::Blake3),
            "sha256" => Ok(Self::Sha256),
            other => Err(HasherError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl ContentDigest for HashAlgorithm {
    fn algorithm_name(&self) -> &str {
        self.as_str()
    }

    fn digest(&self, data: &[u8]) -> ObjectHash {
        let bytes: [u8; 32] = match self {
            Self::Sha3_256 => {
                use sha3::Digest;
                sha3::Sha3_256::digest(data).into()
            }
            Self::Blake3 => *blake3::hash(data).as_bytes(),
            Self::Sha256 => {
                use sha2::Digest;
                sha2::Sha256::digest(data).into()
            }
        };
        ObjectHash::from_hash(bytes)
    }
}

/// Both hashes of one object's canonical bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectDigest {
    /// Addressing hash: storage key and dedup key.
    pub primary: ObjectHash,
    /// Verification hash: only used to detect primary collisions.
    pub secondary: ObjectHash,
}

/// Computes the primary and secondary hash of canonical object bytes.
///
/// The two functions are configured independently. A primary collision that
/// is not also a secondary collision is what the write path reports as a
/// hash collision, so the two must never be the same function.
#[derive(Clone, Debug)]
pub struct HashEngine {
    primary: Arc<dyn ContentDigest>,
    secondary: Arc<dyn ContentDigest>,
}

impl HashEngine {
    /// Engine over two built-in algorithms.
    pub fn new(primary: HashAlgorithm, secondary: HashAlgorithm) -> Result<Self, HasherError> {
        if primary == secondary {
            return Err(HasherError::SameAlgorithm(primary.to_string()));
        }
        Ok(Self::with_digests(Arc::new(primary), Arc::new(secondary)))
    }

    /// Engine over arbitrary digest implementations.
    pub fn with_digests(primary: Arc<dyn ContentDigest>, secondary: Arc<dyn ContentDigest>) -> Self {
        Self { primary, secondary }
    }

    /// Hash `data` with both functions.
    pub fn digest(&self, data: &[u8]) -> ObjectDigest {
        ObjectDigest {
            primary: self.primary.digest(data),
            secondary: self.secondary.digest(data),
        }
    }

    pub fn primary_hash(&self, data: &[u8]) -> ObjectHash {
        self.primary.digest(data)
    }

    pub fn secondary_hash(&self, data: &[u8]) -> ObjectHash {
        self.secondary.digest(data)
    }

    /// Verify that `data` produces exactly the expected pair of hashes.
    pub fn verify(&self, data: &[u8], expected: &ObjectDigest) -> bool {
        self.digest(data) == *expected
    }

    pub fn primary_algorithm(&self) -> &str {
        self.primary.algorithm_name()
    }

    pub fn secondary_algorithm(&self) -> &str {
        self.secondary.algorithm_name()
    }
}

impl Default for HashEngine {
    /// SHA3-256 addressing with BLAKE3 verification.
    fn default() -> Self {
        Self::with_digests(Arc::new(HashAlgorithm::Sha3_256), Arc::new(HashAlgorithm::Blake3))
    }
}

/// Errors from hashing configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("primary and secondary hash must differ, both are {0}")]
    SameAlgorithm(String),
}
