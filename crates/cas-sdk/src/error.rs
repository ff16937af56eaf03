use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("store error: {0}")]
    Store(#[from] cas_store::StoreError),

    #[error("chunking error: {0}")]
    Chunk(#[from] cas_chunk::ChunkError),

    #[error("resolution error: {0}")]
    Dag(#[from] cas_dag::DagError),

    #[error("hash configuration error: {0}")]
    Hasher(#[from] cas_crypto::HasherError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
