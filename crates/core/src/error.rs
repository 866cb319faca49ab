use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error in {path}: {details}")]
    PdfParse { path: PathBuf, details: String },

    #[error("unable to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding credential is missing (set OPENAI_API_KEY)")]
    MissingCredential,

    #[error("invalid embedding endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {details}")]
    ServiceResponse { status: u16, details: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding service returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension {actual} does not match configured {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no index found at {0}")]
    Missing(PathBuf),

    #[error("index at {path} is corrupt: {details}")]
    Corrupt { path: PathBuf, details: String },

    #[error("index was built with embedding model {indexed}, query embedder uses {query}")]
    ModelMismatch { indexed: String, query: String },

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] IngestError),

    #[error("embedding service failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("folder not found: {0}")]
    FolderNotFound(String),
}
