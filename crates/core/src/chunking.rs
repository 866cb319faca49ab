use crate::error::IngestError;
use crate::models::{parent_folder_of, Chunk, SourceDocument};
use std::collections::VecDeque;

/// Separators tried from coarsest to finest: paragraph, line, sentence,
/// word, and finally single characters.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

pub const DEFAULT_CHUNK_SIZE: usize = 300;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Sizes are counted in characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits `text` into ordered, overlapping pieces of at most
/// `config.chunk_size` characters. Every piece is a substring of `text`.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    Ok(split_with_offsets(text, config)?
        .into_iter()
        .map(|(_, piece)| piece)
        .collect())
}

/// Like [`split_text`], pairing each piece with its byte offset in `text`.
pub fn split_with_offsets(
    text: &str,
    config: ChunkingConfig,
) -> Result<Vec<(usize, String)>, IngestError> {
    config.validate()?;
    Ok(split_recursive(text, 0, &DEFAULT_SEPARATORS, config))
}

/// Chunks one document, numbering chunks from `first_index`.
pub fn chunk_document(
    document: &SourceDocument,
    config: ChunkingConfig,
    first_index: u64,
) -> Result<Vec<Chunk>, IngestError> {
    let pieces = split_with_offsets(&document.text, config)?;
    let source_path = document.path.to_string_lossy().to_string();
    let folder = parent_folder_of(&document.path);

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(position, (start_offset, content))| Chunk {
            chunk_index: first_index + position as u64,
            content,
            start_offset,
            source_path: source_path.clone(),
            folder: folder.clone(),
        })
        .collect())
}

/// A slice of the source text and its absolute byte offset.
#[derive(Debug, Clone, Copy)]
struct Piece<'t> {
    offset: usize,
    text: &'t str,
}

fn split_recursive(
    text: &str,
    base: usize,
    separators: &[&str],
    config: ChunkingConfig,
) -> Vec<(usize, String)> {
    let (separator, finer) = pick_separator(text, separators);

    let mut chunks = Vec::new();
    let mut pending: Vec<Piece> = Vec::new();

    for split in split_keeping_separator(text, base, separator) {
        if char_len(split.text) < config.chunk_size {
            pending.push(split);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_splits(&pending, config));
            pending.clear();
        }

        if finer.is_empty() {
            push_trimmed(&mut chunks, split.offset, split.text);
        } else {
            chunks.extend(split_recursive(split.text, split.offset, finer, config));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_splits(&pending, config));
    }

    chunks
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (position, &separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (separator, &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[position + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Splits on `separator`, attaching each separator to the start of the
/// piece that follows it, so the pieces tile `text` without gaps.
fn split_keeping_separator<'t>(text: &'t str, base: usize, separator: &str) -> Vec<Piece<'t>> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(index, ch)| Piece {
                offset: base + index,
                text: &text[index..index + ch.len_utf8()],
            })
            .collect();
    }

    let mut bounds = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            bounds.push((start, index));
        }
        start = index;
    }
    bounds.push((start, text.len()));

    bounds
        .into_iter()
        .filter(|(from, to)| to > from)
        .map(|(from, to)| Piece {
            offset: base + from,
            text: &text[from..to],
        })
        .collect()
}

/// Greedily packs adjacent splits into chunks, carrying up to
/// `chunk_overlap` characters of trailing splits into the next chunk.
/// `splits` must be contiguous in the source text.
fn merge_splits(splits: &[Piece], config: ChunkingConfig) -> Vec<(usize, String)> {
    let mut merged = Vec::new();
    let mut window: VecDeque<(Piece, usize)> = VecDeque::new();
    let mut total = 0usize;

    for &split in splits {
        let len = char_len(split.text);

        if total + len > config.chunk_size && !window.is_empty() {
            push_window(&mut merged, &window);

            while total > config.chunk_overlap
                || (total + len > config.chunk_size && total > 0)
            {
                let Some((_, dropped)) = window.pop_front() else {
                    break;
                };
                total -= dropped;
            }
        }

        window.push_back((split, len));
        total += len;
    }

    push_window(&mut merged, &window);
    merged
}

fn push_window(target: &mut Vec<(usize, String)>, window: &VecDeque<(Piece, usize)>) {
    let Some((first, _)) = window.front() else {
        return;
    };
    let joined: String = window.iter().map(|(piece, _)| piece.text).collect();
    push_trimmed(target, first.offset, &joined);
}

/// Pushes `text` without surrounding whitespace, shifting `offset` past
/// the leading whitespace that was dropped.
fn push_trimmed(target: &mut Vec<(usize, String)>, offset: usize, text: &str) {
    let leading = text.len() - text.trim_start().len();
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        target.push((offset + leading, trimmed.to_string()));
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
        }
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|index| format!("word{index}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn document(text: &str) -> SourceDocument {
        SourceDocument {
            path: PathBuf::from("/data/manuals/pump.pdf"),
            text: text.to_string(),
            page_count: 1,
            images: Vec::new(),
            checksum: "abc".to_string(),
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("  The quick brown fox.  ", ChunkingConfig::default()).unwrap();
        assert_eq!(chunks, vec!["The quick brown fox.".to_string()]);
    }

    #[test]
    fn empty_and_blank_text_produce_no_chunks() {
        assert!(split_text("", ChunkingConfig::default()).unwrap().is_empty());
        assert!(split_text(" \n\n \n", ChunkingConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "The quick brown fox jumps. ".repeat(40);
        let first = split_text(&text, config(300, 100)).unwrap();
        let second = split_text(&text, config(300, 100)).unwrap();
        assert!(first.len() > 1);
        assert_eq!(first, second);
    }

    #[test]
    fn chunks_respect_the_size_bound() {
        let text = format!(
            "{}\n\n{}\n{}",
            numbered_words(120),
            "x".repeat(700),
            numbered_words(40)
        );
        let chunks = split_text(&text, config(50, 10)).unwrap();
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "oversized chunk: {chunk:?}");
        }
    }

    #[test]
    fn paragraph_breaks_are_preferred_over_words() {
        let text = "First paragraph is short.\n\nSecond paragraph is short too.";
        let chunks = split_text(text, config(40, 0)).unwrap();
        assert_eq!(
            chunks,
            vec![
                "First paragraph is short.".to_string(),
                "Second paragraph is short too.".to_string()
            ]
        );
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = numbered_words(200);
        let doc = document(&text);
        let chunks = chunk_document(&doc, config(50, 20), 0).unwrap();
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let previous_end = pair[0].start_offset + pair[0].content.len();
            assert!(
                pair[1].start_offset < previous_end,
                "chunks {} and {} do not overlap",
                pair[0].chunk_index,
                pair[1].chunk_index
            );
        }
    }

    #[test]
    fn chunk_offsets_follow_source_order_and_point_at_content() {
        let text = format!(
            "{}\n\n{}",
            "The quick brown fox jumps. ".repeat(20),
            "Unrelated content about oceans. ".repeat(10)
        );
        let doc = document(&text);
        let chunks = chunk_document(&doc, ChunkingConfig::default(), 7).unwrap();

        assert!(chunks.len() > 2);
        assert_eq!(chunks[0].chunk_index, 7);
        for pair in chunks.windows(2) {
            assert!(pair[0].start_offset <= pair[1].start_offset);
            assert_eq!(pair[1].chunk_index, pair[0].chunk_index + 1);
        }
        for chunk in &chunks {
            let end = chunk.start_offset + chunk.content.len();
            assert_eq!(&text[chunk.start_offset..end], chunk.content);
            assert_eq!(chunk.source_path, "/data/manuals/pump.pdf");
            assert_eq!(chunk.folder, "/data/manuals");
        }
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "검색 서비스 문서 ".repeat(60);
        let doc = document(&text);
        let chunks = chunk_document(&doc, config(30, 10), 0).unwrap();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 30);
            assert!(text[chunk.start_offset..].starts_with(&chunk.content));
        }
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let result = split_text("anything", config(100, 100));
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));

        let result = split_text("anything", config(0, 0));
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }

    #[test]
    fn separator_is_kept_with_the_following_piece() {
        let pieces = split_keeping_separator("a\n\nb\n\n\n\nc", 10, "\n\n");
        let texts: Vec<&str> = pieces.iter().map(|piece| piece.text).collect();
        let offsets: Vec<usize> = pieces.iter().map(|piece| piece.offset).collect();
        assert_eq!(texts, vec!["a", "\n\nb", "\n\n", "\n\nc"]);
        assert_eq!(offsets, vec![10, 11, 14, 16]);
        assert_eq!(texts.concat(), "a\n\nb\n\n\n\nc");
    }

    #[test]
    fn offsets_survive_blank_lines_and_trimmed_whitespace() {
        let fragments = [
            "ab", " ", "\n", "\n\n", ". ", "cd", "efg", "\n\n\n\n", "  ",
        ];
        let mut state = 0x2545_f491u32;
        for _ in 0..500 {
            let mut text = String::new();
            for _ in 0..40 {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                text.push_str(fragments[(state >> 16) as usize % fragments.len()]);
            }

            let chunks = chunk_document(&document(&text), config(8, 3), 0).unwrap();
            for chunk in &chunks {
                assert!(chunk.content.chars().count() <= 8);
                assert!(
                    text[chunk.start_offset..].starts_with(&chunk.content),
                    "chunk {:?} is not at offset {} of {:?}",
                    chunk.content,
                    chunk.start_offset,
                    text
                );
            }
            for pair in chunks.windows(2) {
                assert!(pair[0].start_offset <= pair[1].start_offset);
            }
        }
    }

    #[test]
    fn chunks_after_repeated_blank_lines_point_at_their_text() {
        let text = "ab\n\n\n\n  ab\n efg\n\n\n\nab\n efg";
        let chunks = chunk_document(&document(text), config(8, 3), 0).unwrap();
        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(text[chunk.start_offset..].starts_with(&chunk.content));
        }
    }
}
