use serde::{Deserialize, Serialize};

use crate::error::{ChunkError, ChunkResult};

/// Boundary detection strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkerKind {
    /// Cut every `block_size` bytes, no rolling hash.
    Fixed,
    /// Content-defined, Rabin-Karp polynomial hash.
    RabinKarp,
    /// Content-defined, table-driven BuzHash.
    #[serde(rename = "buzhash")]
    BuzHash,
}

impl std::fmt::Display for ChunkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::RabinKarp => write!(f, "rabin-karp"),
            Self::BuzHash => write!(f, "buzhash"),
        }
    }
}

/// Chunker configuration.
///
/// For the rolling modes a boundary is declared once the current chunk holds
/// at least `min_chunk_size` bytes and
/// `hash & fingerprint_mask == target_fingerprint`, or unconditionally at
/// `max_chunk_size`. `block_size` is only read in [`ChunkerKind::Fixed`] mode;
/// the other fields are only read in the rolling modes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub kind: ChunkerKind,
    pub window_size: usize,
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
    pub fingerprint_mask: u64,
    pub target_fingerprint: u64,
    pub block_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            kind: ChunkerKind::RabinKarp,
            window_size: 48,
            min_chunk_size: 256 * 1024,     // 256 KiB
            max_chunk_size: 4 * 1024 * 1024, // 4 MiB
            fingerprint_mask: 0x3_FFFF,      // ~256 KiB past the minimum
            target_fingerprint: 0,
            block_size: 1024 * 1024,
        }
    }
}

impl ChunkConfig {
    /// Fixed-size chunking.
    pub fn fixed(block_size: usize) -> Self {
        Self {
            kind: ChunkerKind::Fixed,
            block_size,
            ..Self::default()
        }
    }

    /// Rabin-Karp chunking with `mask_bits` low fingerprint bits compared
    /// against zero.
    pub fn rabin_karp(window_size: usize, min: usize, max: usize, mask_bits: u32) -> Self {
        Self::rolling(ChunkerKind::RabinKarp, window_size, min, max, mask_bits)
    }

    /// BuzHash chunking with `mask_bits` low fingerprint bits compared
    /// against zero.
    pub fn buzhash(window_size: usize, min: usize, max: usize, mask_bits: u32) -> Self {
        Self::rolling(ChunkerKind::BuzHash, window_size, min, max, mask_bits)
    }

    fn rolling(kind: ChunkerKind, window_size: usize, min: usize, max: usize, mask_bits: u32) -> Self {
        let fingerprint_mask = if mask_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << mask_bits) - 1
        };
        Self {
            kind,
            window_size,
            min_chunk_size: min,
            max_chunk_size: max,
            fingerprint_mask,
            target_fingerprint: 0,
            ..Self::default()
        }
    }

    /// Override the fingerprint target.
    pub fn with_target(mut self, target_fingerprint: u64) -> Self {
        self.target_fingerprint = target_fingerprint;
        self
    }

    /// Check the configuration for the selected kind.
    pub fn validate(&self) -> ChunkResult<()> {
        if self.kind == ChunkerKind::Fixed {
            if self.block_size == 0 {
                return Err(ChunkError::InvalidConfig("block_size must be non-zero".into()));
            }
            return Ok(());
        }

        if self.window_size == 0 {
            return Err(ChunkError::InvalidConfig("window_size must be non-zero".into()));
        }
        if self.min_chunk_size >= self.max_chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "min_chunk_size ({}) must be smaller than max_chunk_size ({})",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        if self.window_size > self.min_chunk_size {
            return Err(ChunkError::InvalidConfig(format!(
                "window_size ({}) must not exceed min_chunk_size ({})",
                self.window_size, self.min_chunk_size
            )));
        }
        if self.target_fingerprint & !self.fingerprint_mask != 0 {
            return Err(ChunkError::InvalidConfig(format!(
                "target_fingerprint {:#x} has bits outside fingerprint_mask {:#x}",
                self.target_fingerprint, self.fingerprint_mask
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ChunkConfig::default();
        assert_eq!(config.kind, ChunkerKind::RabinKarp);
        assert_eq!(config.window_size, 48);
        config.validate().unwrap();
    }

    #[test]
    fn mask_bits_build_low_mask() {
        let config = ChunkConfig::buzhash(16, 64, 1024, 6);
        assert_eq!(config.fingerprint_mask, 0x3F);
        assert_eq!(ChunkConfig::rabin_karp(16, 64, 1024, 64).fingerprint_mask, u64::MAX);
    }

    #[test]
    fn min_must_be_below_max() {
        let err = ChunkConfig::rabin_karp(16, 1024, 1024, 8).validate().unwrap_err();
        assert!(matches!(err, ChunkError::InvalidConfig(_)));
    }

    #[test]
    fn window_must_fit_in_min() {
        let err = ChunkConfig::rabin_karp(128, 64, 1024, 8).validate().unwrap_err();
        assert!(matches!(err, ChunkError::InvalidConfig(_)));
    }

    #[test]
    fn target_must_fit_mask() {
        let err = ChunkConfig::rabin_karp(16, 64, 1024, 4)
            .with_target(0x10)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ChunkError::InvalidConfig(_)));
    }

    #[test]
    fn fixed_ignores_rolling_fields() {
        let mut config = ChunkConfig::fixed(4096);
        config.min_chunk_size = 10;
        config.max_chunk_size = 5;
        config.validate().unwrap();
        assert!(ChunkConfig::fixed(0).validate().is_err());
    }

    #[test]
    fn kind_serde_is_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: ChunkerKind,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"kind":"rabin-karp"}"#).unwrap();
        assert_eq!(parsed.kind, ChunkerKind::RabinKarp);
        assert_eq!(ChunkerKind::BuzHash.to_string(), "buzhash");
    }
}
