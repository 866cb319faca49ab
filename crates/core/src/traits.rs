use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::models::ScoredChunk;
use async_trait::async_trait;

/// Similarity search over stored chunk embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embedding model the stored vectors were produced with.
    fn model_id(&self) -> &str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embeds `query` with `embedder` and returns up to `k` chunks,
    /// best first (ascending distance).
    async fn similarity_search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError>;
}
