//! Exact nearest-neighbour index persisted as a single JSON manifest.
//!
//! Layout of a persisted index directory:
//!
//! ```text
//! <vector_db_root>/<folder_name>/index.json
//! ```
//!
//! The manifest records the embedding model id and dimensions so that an
//! index is never queried with vectors from a different model.

use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IndexError, PipelineError};
use crate::models::{Chunk, DocumentRecord, ScoredChunk};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

pub const INDEX_FILE_NAME: &str = "index.json";
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexManifest {
    format_version: u32,
    model_id: String,
    dimensions: usize,
    built_at: DateTime<Utc>,
    documents: Vec<DocumentRecord>,
    entries: Vec<IndexEntry>,
}

/// Brute-force index scored by squared Euclidean distance.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    model_id: String,
    dimensions: usize,
    built_at: DateTime<Utc>,
    documents: Vec<DocumentRecord>,
    entries: Vec<IndexEntry>,
}

impl FlatIndex {
    /// Embeds every chunk. Any embedding failure fails the whole build.
    pub async fn build(
        documents: Vec<DocumentRecord>,
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
    ) -> Result<Self, EmbeddingError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };

        if vectors.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        let dimensions = embedder.dimensions();
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != dimensions) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimensions,
                actual: vector.len(),
            });
        }

        debug!(
            model = embedder.model_id(),
            chunk_count = chunks.len(),
            "embedded chunks"
        );

        Ok(Self {
            model_id: embedder.model_id().to_string(),
            dimensions,
            built_at: Utc::now(),
            documents,
            entries: chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry { chunk, vector })
                .collect(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Writes the index into a staging directory next to `path` and renames
    /// it into place, so `path` either holds a complete index or nothing.
    pub fn persist(&self, path: &Path) -> Result<(), IndexError> {
        let staging = staging_path(path);
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent)?;
        }

        let written = self.write_manifest(&staging).and_then(|()| {
            fs::rename(&staging, path)?;
            Ok(())
        });

        if written.is_err() {
            let _ = fs::remove_dir_all(&staging);
        } else {
            info!(
                path = %path.display(),
                chunk_count = self.entries.len(),
                model = %self.model_id,
                "persisted index"
            );
        }
        written
    }

    fn write_manifest(&self, directory: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(directory)?;
        let manifest = IndexManifest {
            format_version: INDEX_FORMAT_VERSION,
            model_id: self.model_id.clone(),
            dimensions: self.dimensions,
            built_at: self.built_at,
            documents: self.documents.clone(),
            entries: self.entries.clone(),
        };

        let file = File::create(directory.join(INDEX_FILE_NAME))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &manifest)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let file_path = path.join(INDEX_FILE_NAME);
        if !file_path.is_file() {
            return Err(IndexError::Missing(path.to_path_buf()));
        }

        let reader = BufReader::new(File::open(&file_path)?);
        let manifest: IndexManifest =
            serde_json::from_reader(reader).map_err(|error| IndexError::Corrupt {
                path: path.to_path_buf(),
                details: error.to_string(),
            })?;

        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::Corrupt {
                path: path.to_path_buf(),
                details: format!("unsupported format version {}", manifest.format_version),
            });
        }

        if let Some(entry) = manifest
            .entries
            .iter()
            .find(|entry| entry.vector.len() != manifest.dimensions)
        {
            return Err(IndexError::Corrupt {
                path: path.to_path_buf(),
                details: format!(
                    "chunk {} has {} components, manifest declares {}",
                    entry.chunk.chunk_index,
                    entry.vector.len(),
                    manifest.dimensions
                ),
            });
        }

        debug!(path = %path.display(), chunk_count = manifest.entries.len(), "loaded index");

        Ok(Self {
            model_id: manifest.model_id,
            dimensions: manifest.dimensions,
            built_at: manifest.built_at,
            documents: manifest.documents,
            entries: manifest.entries,
        })
    }

    /// The `k` entries closest to `query_vector`; ties keep chunk order.
    pub fn nearest(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query_vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (squared_distance(query_vector, &entry.vector), entry))
            .collect();

        scored.sort_by(|left, right| {
            left.0
                .total_cmp(&right.0)
                .then(left.1.chunk.chunk_index.cmp(&right.1.chunk.chunk_index))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    async fn similarity_search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, PipelineError> {
        if embedder.model_id() != self.model_id {
            return Err(IndexError::ModelMismatch {
                indexed: self.model_id.clone(),
                query: embedder.model_id().to_string(),
            }
            .into());
        }

        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = embedder.embed_query(query).await?;
        Ok(self.nearest(&query_vector, k)?)
    }
}

fn squared_distance(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());
    path.with_file_name(format!(".{name}.staging-{}", Uuid::new_v4()))
}
