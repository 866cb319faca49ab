use crate::config::{EmbeddingConfig, PipelineConfig};
use crate::embeddings::{create_embedder, Embedder};
use crate::error::{EmbeddingError, PipelineError};
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::ingest::{chunk_documents, extract_folder, list_folder_pdfs, list_folders};
use crate::models::{FolderState, IndexOutcome, SearchResult, SourceDocument};
use crate::retrieval::search_index;
use crate::store::FlatIndex;
use crate::traits::VectorIndex;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Owns the per-folder index lifecycle: a folder is `NotIndexed` until its
/// persisted index exists, after which it is only ever loaded.
///
/// Building and searching take `&mut self`, so one instance never runs two
/// builds or a build and a query at the same time.
///
/// The embedder is created on the first build or search, so listing folders
/// and files works without an embedding credential.
pub struct FolderSearch<E = LopdfExtractor>
where
    E: PdfExtractor,
{
    config: PipelineConfig,
    embedder: Option<Box<dyn Embedder>>,
    extractor: E,
    loaded: HashMap<String, FlatIndex>,
}

impl FolderSearch<LopdfExtractor> {
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.chunking.validate()?;
        Ok(Self {
            config,
            embedder: None,
            extractor: LopdfExtractor,
            loaded: HashMap::new(),
        })
    }
}

impl<E> FolderSearch<E>
where
    E: PdfExtractor,
{
    pub fn new(config: PipelineConfig, embedder: Box<dyn Embedder>, extractor: E) -> Self {
        Self {
            config,
            embedder: Some(embedder),
            extractor,
            loaded: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Subfolders of the data root, minus the index root when it lives there.
    pub fn list_folders(&self) -> Result<Vec<String>, PipelineError> {
        Ok(list_folders(&self.config.data_root)?
            .into_iter()
            .filter(|name| !self.is_index_root(&self.config.data_root.join(name)))
            .collect())
    }

    /// Resolves a folder name to its directory under the data root. Only
    /// plain names of existing immediate subdirectories are accepted.
    pub fn folder_path(&self, folder: &str) -> Result<PathBuf, PipelineError> {
        let mut components = Path::new(folder).components();
        let is_plain_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );

        let path = self.config.data_root.join(folder);
        if !is_plain_name || !path.is_dir() || self.is_index_root(&path) {
            return Err(PipelineError::FolderNotFound(folder.to_string()));
        }
        Ok(path)
    }

    fn is_index_root(&self, path: &Path) -> bool {
        match (
            fs::canonicalize(path),
            fs::canonicalize(&self.config.vector_db_root),
        ) {
            (Ok(candidate), Ok(index_root)) => candidate == index_root,
            _ => false,
        }
    }

    pub fn index_path(&self, folder: &str) -> PathBuf {
        self.config.vector_db_root.join(folder)
    }

    pub fn list_folder_pdfs(&self, folder: &str) -> Result<Vec<String>, PipelineError> {
        let path = self.folder_path(folder)?;
        Ok(list_folder_pdfs(&path)?)
    }

    pub fn state(&self, folder: &str) -> FolderState {
        if self.loaded.contains_key(folder) || self.index_path(folder).exists() {
            FolderState::Indexed
        } else {
            FolderState::NotIndexed
        }
    }

    /// Loads the folder's index, building and persisting it first when no
    /// persisted index exists. A failed build persists nothing.
    pub async fn ensure_index(&mut self, folder: &str) -> Result<IndexOutcome, PipelineError> {
        let folder_path = self.folder_path(folder)?;

        if let Some(index) = self.loaded.get(folder) {
            return Ok(IndexOutcome::Loaded {
                chunks: index.len(),
                built_at: index.built_at(),
            });
        }

        let index_path = self.index_path(folder);
        if index_path.exists() {
            let index = FlatIndex::load(&index_path)?;
            info!(folder, chunk_count = index.len(), "loaded persisted index");
            let outcome = IndexOutcome::Loaded {
                chunks: index.len(),
                built_at: index.built_at(),
            };
            self.loaded.insert(folder.to_string(), index);
            return Ok(outcome);
        }

        let report = extract_folder(&folder_path, &self.extractor, self.config.failure_policy)?;
        if report.documents.is_empty() {
            info!(folder, skipped = report.skipped_files.len(), "no pdf documents to index");
            return Ok(IndexOutcome::EmptyFolder);
        }

        let chunks = chunk_documents(&report.documents, self.config.chunking)?;
        let documents = report.documents.iter().map(SourceDocument::record).collect();
        let document_count = report.documents.len();
        let chunk_count = chunks.len();

        let embedder = resolve_embedder(&mut self.embedder, &self.config.embedding)?;
        info!(
            folder,
            documents = document_count,
            chunk_count,
            model = embedder.model_id(),
            "building index"
        );

        let index = FlatIndex::build(documents, chunks, embedder).await?;
        index.persist(&index_path)?;
        self.loaded.insert(folder.to_string(), index);

        Ok(IndexOutcome::Built {
            documents: document_count,
            chunks: chunk_count,
            skipped: report.skipped_files,
        })
    }

    /// An empty query performs no search and builds nothing.
    pub async fn search(
        &mut self,
        folder: &str,
        query: &str,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        if self.ensure_index(folder).await? == IndexOutcome::EmptyFolder {
            return Ok(Vec::new());
        }

        let embedder = resolve_embedder(&mut self.embedder, &self.config.embedding)?;
        match self.loaded.get(folder) {
            Some(index) => search_index(index, embedder, query, self.config.fan_out).await,
            None => Ok(Vec::new()),
        }
    }
}

fn resolve_embedder<'a>(
    slot: &'a mut Option<Box<dyn Embedder>>,
    config: &EmbeddingConfig,
) -> Result<&'a dyn Embedder, EmbeddingError> {
    let embedder = match slot.take() {
        Some(embedder) => embedder,
        None => create_embedder(config)?,
    };
    let embedder: &'a Box<dyn Embedder> = slot.insert(embedder);
    Ok(embedder.as_ref())
}
