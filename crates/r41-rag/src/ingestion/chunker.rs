//! Sentence-aware text chunking with overlap

use unicode_segmentation::UnicodeSegmentation;

/// Text chunker with configurable size and overlap (in bytes of UTF-8 text)
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size
    chunk_size: usize,
    /// Overlap carried from the end of one chunk into the next
    overlap: usize,
    /// Chunks shorter than this are dropped
    min_size: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            min_size: 20,
        }
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Split `text` into overlapping chunks along sentence boundaries
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for piece in self.pieces(text) {
            if !current.is_empty() && current.len() + piece.len() > self.chunk_size {
                self.push_chunk(&mut chunks, &current);

                // start the next chunk with overlap
                current = self.overlap_text(&current);
                if current.len() + piece.len() > self.chunk_size {
                    current.clear();
                }
            }
            current.push_str(piece);
        }

        self.push_chunk(&mut chunks, &current);
        chunks
    }

    fn push_chunk(&self, chunks: &mut Vec<String>, text: &str) {
        let trimmed = text.trim();
        if trimmed.len() >= self.min_size {
            chunks.push(trimmed.to_string());
        }
    }

    /// Sentences, with sentences longer than a chunk split on word bounds
    fn pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut pieces = Vec::new();
        for sentence in text.split_sentence_bounds() {
            if sentence.len() <= self.chunk_size {
                pieces.push(sentence);
                continue;
            }
            let mut start = 0;
            let mut end = 0;
            for (offset, word) in sentence.split_word_bound_indices() {
                let word_end = offset + word.len();
                if word_end - start > self.chunk_size && end > start {
                    pieces.push(&sentence[start..end]);
                    start = end;
                }
                end = word_end;
            }
            if end > start {
                pieces.push(&sentence[start..end]);
            }
        }
        pieces
    }

    /// Tail of `text` of at most `overlap` bytes, starting at a clean boundary
    fn overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }
        if text.len() <= self.overlap {
            return text.to_string();
        }

        let mut start = text.len() - self.overlap;
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }
        let tail = &text[start..];

        if let Some(pos) = tail.find(". ") {
            return tail[pos + 2..].to_string();
        }
        if let Some(pos) = tail.find(' ') {
            return tail[pos + 1..].to_string();
        }
        tail.to_string()
    }
}
