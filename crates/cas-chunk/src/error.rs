/// Errors from chunking a byte source.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// A non-empty source ended before the rolling window could be seeded.
    #[error("source too small for rolling window: {available} bytes available, window is {window_size}")]
    InsufficientData { available: usize, window_size: usize },

    /// The chunker configuration is unusable.
    #[error("invalid chunker configuration: {0}")]
    InvalidConfig(String),

    /// Reading the source failed.
    #[error("I/O error while chunking: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for chunking operations.
pub type ChunkResult<T> = Result<T, ChunkError>;
