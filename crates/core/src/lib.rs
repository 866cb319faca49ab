pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod retrieval;
pub mod store;
pub mod traits;

pub use chunking::{chunk_document, split_text, split_with_offsets, ChunkingConfig};
pub use config::{EmbeddingConfig, EmbeddingProvider, FailurePolicy, PipelineConfig};
pub use embeddings::{
    create_embedder, CharacterNgramEmbedder, Embedder, OpenAiEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbeddingError, IndexError, IngestError, PipelineError};
pub use extractor::{LopdfExtractor, PdfExtractor};
pub use ingest::{
    chunk_documents, discover_pdf_files, extract_folder, list_folder_pdfs, list_folders,
    IngestionReport,
};
pub use models::{
    Chunk, DocumentRecord, ExtractedImage, FolderState, IndexOutcome, ScoredChunk, SearchResult,
    SkippedPdf, SourceDocument,
};
pub use orchestrator::FolderSearch;
pub use retrieval::{dedup_by_file, excerpt, search_index, EXCERPT_CHARS};
pub use store::{FlatIndex, IndexEntry, INDEX_FILE_NAME};
pub use traits::VectorIndex;
