use crate::error::IngestError;
use crate::models::{ExtractedImage, SourceDocument};
use lopdf::Document;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

pub trait PdfExtractor {
    fn extract(&self, path: &Path) -> Result<SourceDocument, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<SourceDocument, IngestError> {
        let bytes = std::fs::read(path)?;
        let document = Document::load_mem(&bytes).map_err(|error| parse_error(path, error))?;

        let pages = document.get_pages();
        let mut text = String::new();
        let mut images = Vec::new();

        // get_pages is keyed by page number, so iteration is document order.
        for (&page_no, &page_id) in &pages {
            let page_text = document
                .extract_text(&[page_no])
                .map_err(|error| parse_error(path, error))?;
            text.push_str(&page_text);

            match document.get_page_images(page_id) {
                Ok(page_images) => {
                    images.extend(page_images.into_iter().map(|image| ExtractedImage {
                        page: page_no,
                        filter: image
                            .filters
                            .as_ref()
                            .and_then(|filters| filters.first().cloned()),
                        bytes: image.content.to_vec(),
                    }));
                }
                Err(error) => {
                    debug!(path = %path.display(), page = page_no, %error, "skipping page images");
                }
            }
        }

        Ok(SourceDocument {
            path: path.to_path_buf(),
            text,
            page_count: pages.len() as u32,
            images,
            checksum: digest_bytes(&bytes),
        })
    }
}

fn parse_error(path: &Path, error: lopdf::Error) -> IngestError {
    IngestError::PdfParse {
        path: path.to_path_buf(),
        details: error.to_string(),
    }
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes a minimal single-font PDF with one page per entry in `pages`.
#[cfg(test)]
pub(crate) fn write_text_pdf(
    path: &Path,
    pages: &[&str],
) -> Result<(), Box<dyn std::error::Error>> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page_text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*page_text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}
