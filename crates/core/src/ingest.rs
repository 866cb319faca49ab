use crate::chunking::{chunk_document, ChunkingConfig};
use crate::config::FailurePolicy;
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::models::{Chunk, SkippedPdf, SourceDocument};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Every PDF anywhere under `folder`, sorted. Fails if any part of the
/// tree cannot be read.
pub fn discover_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let (files, failures) = walk_pdf_files(folder);
    match failures.into_iter().next() {
        Some(failure) => Err(failure.into()),
        None => Ok(files),
    }
}

/// PDFs found under `folder`, sorted, along with the walk errors met on the way.
fn walk_pdf_files(folder: &Path) -> (Vec<PathBuf>, Vec<walkdir::Error>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();

    for item in WalkDir::new(folder) {
        match item {
            Ok(entry) if entry.file_type().is_file() && is_pdf(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(error) => failures.push(error),
        }
    }

    files.sort_unstable();
    (files, failures)
}

/// Names of the immediate subdirectories of `root`, sorted.
pub fn list_folders(root: &Path) -> Result<Vec<String>, IngestError> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    folders.sort_unstable();
    Ok(folders)
}

/// File names of the PDFs directly inside `folder`, sorted.
pub fn list_folder_pdfs(folder: &Path) -> Result<Vec<String>, IngestError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_pdf(&entry.path()) {
            files.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    files.sort_unstable();
    Ok(files)
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub documents: Vec<SourceDocument>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Extracts every PDF under `folder`. Under [`FailurePolicy::Abort`] the
/// first unreadable directory or PDF is returned as an error; otherwise
/// failures are collected.
pub fn extract_folder<E: PdfExtractor + ?Sized>(
    folder: &Path,
    extractor: &E,
    policy: FailurePolicy,
) -> Result<IngestionReport, IngestError> {
    let mut report = IngestionReport::default();
    let (files, failures) = walk_pdf_files(folder);

    for failure in failures {
        let path = failure.path().unwrap_or(folder).to_path_buf();
        record_failure(&mut report, policy, path, failure.into())?;
    }

    for path in files {
        match extractor.extract(&path) {
            Ok(document) => {
                debug!(
                    path = %path.display(),
                    pages = document.page_count,
                    images = document.images.len(),
                    "extracted pdf"
                );
                report.documents.push(document);
            }
            Err(error) => record_failure(&mut report, policy, path, error)?,
        }
    }

    Ok(report)
}

fn record_failure(
    report: &mut IngestionReport,
    policy: FailurePolicy,
    path: PathBuf,
    error: IngestError,
) -> Result<(), IngestError> {
    match policy {
        FailurePolicy::Abort => Err(error),
        FailurePolicy::SkipUnreadable => {
            warn!(path = %path.display(), reason = %error, "skipped pdf");
            report.skipped_files.push(SkippedPdf {
                path,
                reason: error.to_string(),
            });
            Ok(())
        }
    }
}

/// Chunks documents in order with a single global chunk numbering.
pub fn chunk_documents(
    documents: &[SourceDocument],
    config: ChunkingConfig,
) -> Result<Vec<Chunk>, IngestError> {
    let mut chunks = Vec::new();
    for document in documents {
        let next_index = chunks.len() as u64;
        chunks.extend(chunk_document(document, config, next_index)?);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{write_text_pdf, LopdfExtractor};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("B.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(base.join("notes.txt"), b"not a pdf")?;

        let files = discover_pdf_files(base)?;
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn folder_listing_only_returns_directories() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("manuals"))?;
        fs::create_dir(dir.path().join("contracts"))?;
        fs::write(dir.path().join("loose.pdf"), b"%PDF-1.4")?;

        let folders = list_folders(dir.path())?;
        assert_eq!(folders, vec!["contracts".to_string(), "manuals".to_string()]);
        Ok(())
    }

    #[test]
    fn folder_pdf_listing_is_not_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("top.pdf"), b"%PDF-1.4")?;
        fs::write(dir.path().join("nested").join("deep.pdf"), b"%PDF-1.4")?;

        let files = list_folder_pdfs(dir.path())?;
        assert_eq!(files, vec!["top.pdf".to_string()]);
        Ok(())
    }

    #[test]
    fn abort_policy_fails_on_first_unreadable_pdf() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        write_text_pdf(&dir.path().join("good.pdf"), &["Readable text"])?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let result = extract_folder(dir.path(), &LopdfExtractor, FailurePolicy::Abort);
        assert!(matches!(result, Err(IngestError::PdfParse { .. })));
        Ok(())
    }

    #[test]
    fn skip_policy_reports_unreadable_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        write_text_pdf(&dir.path().join("good.pdf"), &["Readable text"])?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let report = extract_folder(dir.path(), &LopdfExtractor, FailurePolicy::SkipUnreadable)?;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }

    #[test]
    fn missing_folder_is_a_walk_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");

        assert!(matches!(
            discover_pdf_files(&missing),
            Err(IngestError::Walk(_))
        ));
        assert!(matches!(
            extract_folder(&missing, &LopdfExtractor, FailurePolicy::Abort),
            Err(IngestError::Walk(_))
        ));

        let report =
            extract_folder(&missing, &LopdfExtractor, FailurePolicy::SkipUnreadable).unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.skipped_files.len(), 1);
        assert!(report.skipped_files[0].path.ends_with("gone"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subfolder_follows_the_failure_policy() -> Result<(), Box<dyn std::error::Error>>
    {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir()?;
        write_text_pdf(&dir.path().join("good.pdf"), &["Readable text"])?;
        let locked = dir.path().join("locked");
        fs::create_dir(&locked)?;
        write_text_pdf(&locked.join("hidden.pdf"), &["Hidden text"])?;

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
        let readable_anyway = fs::read_dir(&locked).is_ok();
        let aborted = extract_folder(dir.path(), &LopdfExtractor, FailurePolicy::Abort);
        let skipped = extract_folder(dir.path(), &LopdfExtractor, FailurePolicy::SkipUnreadable);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))?;

        // Privileged users read through directory permissions.
        if readable_anyway {
            return Ok(());
        }

        assert!(matches!(aborted, Err(IngestError::Walk(_))));
        let report = skipped?;
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert!(report.skipped_files[0].path.ends_with("locked"));
        Ok(())
    }

    #[test]
    fn empty_folder_yields_empty_report() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let report = extract_folder(dir.path(), &LopdfExtractor, FailurePolicy::Abort)?;
        assert!(report.documents.is_empty());
        assert!(report.skipped_files.is_empty());
        Ok(())
    }

    #[test]
    fn chunk_numbering_spans_documents() -> Result<(), Box<dyn std::error::Error>> {
        let make = |name: &str, text: &str| SourceDocument {
            path: PathBuf::from(format!("/docs/{name}")),
            text: text.to_string(),
            page_count: 1,
            images: Vec::new(),
            checksum: String::new(),
        };
        let documents = vec![
            make("a.pdf", &"alpha beta gamma ".repeat(40)),
            make("b.pdf", "short"),
        ];

        let chunks = chunk_documents(&documents, ChunkingConfig::default())?;
        let last = chunks.last().expect("chunks");
        assert_eq!(last.source_path, "/docs/b.pdf");
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, position as u64);
        }
        Ok(())
    }
}
