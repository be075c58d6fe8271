//! Chunk module - bounded slices of source text

/// A contiguous slice of the source text submitted to the model in one request
///
/// Chunks are produced once per run, in document order, and are never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    text: String,
}

impl Chunk {
    /// Create a chunk at the given zero-based position
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Zero-based position of the chunk in the document
    pub fn index(&self) -> usize {
        self.index
    }

    /// One-based ordinal, as shown to users ("part 3/12")
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }

    /// The chunk text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in characters (not bytes)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The first `max_chars` characters, for logs
    pub fn preview(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}
