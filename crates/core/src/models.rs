use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Raw image stream pulled out of a PDF page. Kept for provenance only,
/// images are never embedded or searched.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub page: u32,
    pub filter: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub text: String,
    pub page_count: u32,
    pub images: Vec<ExtractedImage>,
    pub checksum: String,
}

impl SourceDocument {
    pub fn record(&self) -> DocumentRecord {
        DocumentRecord {
            source_path: self.path.to_string_lossy().to_string(),
            file_name: file_name_of(&self.path),
            page_count: self.page_count,
            image_count: self.images.len(),
            checksum: self.checksum.clone(),
        }
    }
}

/// Document-level metadata stored once per source file in an index manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    pub source_path: String,
    pub file_name: String,
    pub page_count: u32,
    pub image_count: usize,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_index: u64,
    pub content: String,
    /// Byte offset of `content` inside the source document's text.
    pub start_offset: usize,
    pub source_path: String,
    pub folder: String,
}

impl Chunk {
    pub fn file_name(&self) -> String {
        file_name_of(Path::new(&self.source_path))
    }
}

/// One nearest-neighbour match. Lower `score` is more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub file: String,
    pub folder: String,
    pub matched_text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    NotIndexed,
    Indexed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Built {
        documents: usize,
        chunks: usize,
        skipped: Vec<SkippedPdf>,
    },
    Loaded {
        chunks: usize,
        built_at: DateTime<Utc>,
    },
    EmptyFolder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub(crate) fn parent_folder_of(path: &Path) -> String {
    path.parent()
        .map(|parent| parent.to_string_lossy().to_string())
        .unwrap_or_default()
}
