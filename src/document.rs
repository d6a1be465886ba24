use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RagError, Result};

/// One source file, read in full.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub source: PathBuf,
}

/// A bounded window of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: PathBuf,
    /// Offset of the window within the parent document, in characters.
    pub offset: usize,
}

/// Loads every `.txt` file under `dir` recursively, one [`Document`] per
/// file. Traversal order follows the filesystem and is not a contract.
pub fn load_documents(dir: impl AsRef<Path>) -> Result<Vec<Document>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(RagError::NotFound(dir.to_path_buf()));
    }

    let mut documents = Vec::new();
    collect_documents(dir, &mut documents)?;
    debug!(count = documents.len(), dir = %dir.display(), "loaded documents");
    Ok(documents)
}

fn collect_documents(dir: &Path, documents: &mut Vec<Document>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_documents(&path, documents)?;
        } else if path.extension().is_some_and(|ext| ext == "txt") {
            let text = fs::read_to_string(&path)?;
            documents.push(Document { text, source: path });
        }
    }
    Ok(())
}

/// Splits each document into windows of at most `chunk_size` characters,
/// consecutive windows overlapping by `overlap` characters.
///
/// Window ends are snapped back to the nearest paragraph break, then line
/// break, then space, provided at least half the window is kept; otherwise
/// the cut is a hard one at the size limit. All indexing is by character,
/// so a window never ends inside a multibyte sequence. A document shorter
/// than `chunk_size` yields a single chunk; an empty one yields none.
pub fn split_documents(documents: &[Document], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    assert!(chunk_size > 0, "chunk_size must be positive");
    assert!(overlap < chunk_size, "overlap must be less than chunk_size");

    let mut chunks = Vec::new();
    for document in documents {
        split_text(&document.text, chunk_size, overlap, |text, offset| {
            chunks.push(Chunk {
                text,
                source: document.source.clone(),
                offset,
            });
        });
    }
    chunks
}

fn split_text(text: &str, chunk_size: usize, overlap: usize, mut emit: impl FnMut(String, usize)) {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return;
    }

    let mut start = 0;
    while start < total {
        let hard_end = (start + chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            snap_to_boundary(&chars[start..hard_end]).map_or(hard_end, |cut| start + cut)
        };

        emit(chars[start..end].iter().collect(), start);

        if end == total {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
}

/// Finds a natural cut point inside a full window: after the last paragraph
/// break, then line break, then space. Returns `None` (hard cut) when the
/// best boundary would keep less than half the window.
fn snap_to_boundary(window: &[char]) -> Option<usize> {
    let min_keep = window.len() / 2;

    let paragraph = window
        .windows(2)
        .rposition(|pair| pair[0] == '\n' && pair[1] == '\n')
        .map(|pos| pos + 2);
    if let Some(cut) = paragraph.filter(|&cut| cut > min_keep) {
        return Some(cut);
    }

    for separator in ['\n', ' '] {
        let found = window
            .iter()
            .rposition(|&c| c == separator)
            .map(|pos| pos + 1);
        if let Some(cut) = found.filter(|&cut| cut > min_keep) {
            return Some(cut);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn doc(text: &str) -> Vec<Document> {
        vec![Document {
            text: text.to_string(),
            source: PathBuf::from("test.txt"),
        }]
    }

    #[test]
    fn load_reads_txt_files_recursively() -> anyhow::Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("nested"))?;
        writeln!(File::create(dir.path().join("a.txt"))?, "alpha")?;
        writeln!(File::create(dir.path().join("nested/b.txt"))?, "beta")?;
        writeln!(File::create(dir.path().join("skip.md"))?, "ignored")?;

        let mut documents = load_documents(dir.path())?;
        documents.sort_by(|a, b| a.source.cmp(&b.source));
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].text.trim(), "alpha");
        assert_eq!(documents[1].text.trim(), "beta");
        Ok(())
    }

    #[test]
    fn load_missing_directory_is_not_found() {
        assert!(matches!(
            load_documents("no/such/dir"),
            Err(RagError::NotFound(_))
        ));
    }

    #[test]
    fn hard_split_offsets_are_deterministic() {
        // 2500 boundary-free chars, size 1000, overlap 200.
        let text = "x".repeat(2500);
        let chunks = split_documents(&doc(&text), 1000, 200);

        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 800, 1600]);
        assert_eq!(chunks[0].text.chars().count(), 1000);
        assert_eq!(chunks[2].text.chars().count(), 900);
    }

    #[test]
    fn short_document_is_one_chunk_and_empty_is_none() {
        let chunks = split_documents(&doc("short text"), 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].offset, 0);

        assert!(split_documents(&doc(""), 1000, 200).is_empty());
    }

    #[test]
    fn chunks_cover_the_whole_text_without_gaps() {
        let text: String = (0..997).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        for (size, overlap) in [(100, 0), (100, 30), (64, 63), (1, 0)] {
            let chunks = split_documents(&doc(&text), size, overlap);
            let mut covered_to = 0usize;
            for chunk in &chunks {
                assert!(chunk.offset <= covered_to, "gap before offset {}", chunk.offset);
                covered_to = covered_to.max(chunk.offset + chunk.text.chars().count());
                assert!(chunk.text.chars().count() <= size);
            }
            assert_eq!(covered_to, text.chars().count());
        }
    }

    #[test]
    fn rechunking_small_chunks_is_identity() {
        let text = "one two three four five six seven eight nine ten";
        let first = split_documents(&doc(text), 20, 5);
        for chunk in &first {
            let again = split_documents(&doc(&chunk.text), 20, 5);
            assert_eq!(again.len(), 1);
            assert_eq!(again[0].text, chunk.text);
        }
    }

    #[test]
    fn splits_prefer_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(70), "b".repeat(70));
        let chunks = split_documents(&doc(&text), 100, 10);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert!(chunks[1].text.starts_with('b') || chunks[1].text.contains('b'));
    }

    #[test]
    fn never_cuts_inside_multibyte_characters() {
        let text = "héllo wörld ünïcode çharacters ".repeat(40);
        let chunks = split_documents(&doc(&text), 50, 10);
        // Reassembling by offsets must agree with the original chars.
        let chars: Vec<char> = text.chars().collect();
        for chunk in &chunks {
            let expected: String = chars
                [chunk.offset..chunk.offset + chunk.text.chars().count()]
                .iter()
                .collect();
            assert_eq!(chunk.text, expected);
        }
    }
}
