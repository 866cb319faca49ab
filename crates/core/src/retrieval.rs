use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::models::{parent_folder_of, ScoredChunk, SearchResult};
use crate::traits::VectorIndex;
use std::collections::HashSet;
use std::path::Path;

pub const EXCERPT_CHARS: usize = 200;

/// Runs `query` against `index` with a fan-out of `fan_out` chunks and
/// folds the matches into at most one result per file name.
pub async fn search_index<I>(
    index: &I,
    embedder: &dyn Embedder,
    query: &str,
    fan_out: usize,
) -> Result<Vec<SearchResult>, PipelineError>
where
    I: VectorIndex + ?Sized,
{
    if query.trim().is_empty() || index.is_empty() {
        return Ok(Vec::new());
    }

    let matches = index.similarity_search(embedder, query, fan_out).await?;
    Ok(dedup_by_file(matches))
}

/// Keeps the first, best-scoring, match of each file name. `matches` must
/// be ordered best first.
pub fn dedup_by_file(matches: Vec<ScoredChunk>) -> Vec<SearchResult> {
    let mut seen_files = HashSet::new();
    let mut results = Vec::new();

    for found in matches {
        let source = Path::new(&found.chunk.source_path);
        let file = found.chunk.file_name();
        if !seen_files.insert(file.clone()) {
            continue;
        }

        results.push(SearchResult {
            file,
            folder: parent_folder_of(source),
            matched_text: excerpt(&found.chunk.content),
            score: found.score,
        });
    }

    results
}

/// First [`EXCERPT_CHARS`] characters with every line break turned into a space.
pub fn excerpt(content: &str) -> String {
    content
        .chars()
        .take(EXCERPT_CHARS)
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect()
}
