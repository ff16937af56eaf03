use std::path::Path;
use std::time::Duration;

use cas_chunk::ChunkConfig;
use cas_crypto::{HashAlgorithm, HashEngine};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Store-wide settings.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// list_length = 64
/// lock_timeout_ms = 30000
///
/// [chunking]
/// kind = "buzhash"
/// min_chunk_size = 65536
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of children per List object.
    pub list_length: usize,
    /// Upper bound on byte writes in flight at once.
    pub max_in_flight_writes: usize,
    pub primary_hash: HashAlgorithm,
    pub secondary_hash: HashAlgorithm,
    /// Give up waiting for a per-hash lock after this many milliseconds.
    /// Waits indefinitely when unset.
    pub lock_timeout_ms: Option<u64>,
    pub max_resolve_depth: usize,
    pub chunking: ChunkConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            list_length: 128,
            max_in_flight_writes: 64,
            primary_hash: HashAlgorithm::Sha3_256,
            secondary_hash: HashAlgorithm::Blake3,
            lock_timeout_ms: None,
            max_resolve_depth: cas_dag::DEFAULT_MAX_DEPTH,
            chunking: ChunkConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.list_length < 2 {
            return Err(SdkError::Config(format!(
                "list_length must be at least 2, got {}",
                self.list_length
            )));
        }
        if self.max_in_flight_writes == 0 {
            return Err(SdkError::Config("max_in_flight_writes must be positive".into()));
        }
        if self.max_resolve_depth == 0 {
            return Err(SdkError::Config("max_resolve_depth must be positive".into()));
        }
        self.hash_engine()?;
        self.chunking.validate()?;
        Ok(())
    }

    /// The configured primary/secondary hash pair.
    pub fn hash_engine(&self) -> SdkResult<HashEngine> {
        Ok(HashEngine::new(self.primary_hash, self.secondary_hash)?)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}
