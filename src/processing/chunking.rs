//! Character-budget chunking with natural-boundary preference and exact overlap.
//!
//! Lengths are measured in chars. Each window `[start, start + size)` is cut after the last
//! separator (tried in order: paragraph, line, sentence, clause, word) that falls past the
//! window midpoint and beyond the overlap; otherwise the window is cut hard at `size`. The
//! next window starts `overlap` chars before the previous cut, so adjacent chunks always share
//! exactly `overlap` chars and every char is covered.

use super::types::ChunkingError;

/// Boundaries tried in order of preference.
pub const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " "];

/// Bounded substring of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its document.
    pub index: usize,
    /// Char offset of the first char within the document text.
    pub start: usize,
    /// Chunk text.
    pub text: String,
    /// Chars shared with the previous chunk (0 for the first chunk).
    pub overlap_with_previous: usize,
}

impl Chunk {
    /// Length in chars.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits text into overlapping chunks of at most `chunk_size` chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker; `overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum chunk length in chars.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Chars shared by adjacent chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks. Empty text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        // Byte offset of every char boundary, including the end of the text.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        loop {
            let window_end = (start + self.chunk_size).min(total);
            let end = if window_end == total {
                total
            } else {
                self.find_cut(text, &offsets, start, window_end)
            };

            chunks.push(Chunk {
                index: chunks.len(),
                start,
                text: text[offsets[start]..offsets[end]].to_string(),
                overlap_with_previous: if chunks.is_empty() { 0 } else { self.overlap },
            });

            if end == total {
                break;
            }
            start = end - self.overlap;
        }

        chunks
    }

    /// Char index at which to end the window starting at `start`.
    fn find_cut(&self, text: &str, offsets: &[usize], start: usize, window_end: usize) -> usize {
        let min_cut = (start + self.chunk_size / 2).max(start + self.overlap + 1);
        let window = &text[offsets[start]..offsets[window_end]];

        for separator in SEPARATORS {
            let Some(position) = window.rfind(separator) else {
                continue;
            };
            let cut_byte = offsets[start] + position + separator.len();
            if let Ok(cut) = offsets.binary_search(&cut_byte) {
                if cut >= min_cut {
                    return cut;
                }
            }
        }

        window_end
    }
}
