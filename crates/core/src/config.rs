use crate::chunking::ChunkingConfig;
use std::path::PathBuf;

pub const DEFAULT_FAN_OUT: usize = 10;
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_DIMENSIONS: usize = 1536;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Any unreadable PDF aborts the whole build.
    #[default]
    Abort,
    /// Unreadable PDFs are reported and left out of the index.
    SkipUnreadable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    OpenAi,
    Ngram,
}

#[derive(Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub endpoint: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAi,
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            dimensions: DEFAULT_OPENAI_DIMENSIONS,
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            batch_size: 64,
            max_retries: 3,
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .field("endpoint", &self.endpoint)
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_root: PathBuf,
    pub vector_db_root: PathBuf,
    pub chunking: ChunkingConfig,
    pub fan_out: usize,
    pub failure_policy: FailurePolicy,
    pub embedding: EmbeddingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            vector_db_root: PathBuf::from("vector_db"),
            chunking: ChunkingConfig::default(),
            fan_out: DEFAULT_FAN_OUT,
            failure_policy: FailurePolicy::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}
