//! Text chunking for large documents
//!
//! Lines are packed greedily up to the budget. A line that cannot fit on
//! its own is split into sentences, and a sentence that still cannot fit is
//! cut at the budget regardless of word boundaries. Small chunks are then
//! merged into their successor. Nothing is dropped: concatenating the
//! chunks reproduces the input exactly.

use crate::config::GenerationConfig;
use cardwright_domain::Chunk;

/// Splits text into bounded chunks
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_chars: usize,
    min_chars: usize,
}

impl TextChunker {
    /// Create a new text chunker; lengths are in characters
    pub fn new(max_chars: usize, min_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            min_chars,
        }
    }

    /// Create a chunker sized for a run configuration
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.chunk_char_budget(), config.min_chunk_chars)
    }

    /// Budget per chunk
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Chunk the given text
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        self.merge_small(self.split(text))
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk::new(index, text))
            .collect()
    }

    fn split(&self, text: &str) -> Vec<String> {
        let mut pieces = Pending::default();

        for line in text.split_inclusive('\n') {
            let line_len = line.chars().count();

            if pieces.len + line_len <= self.max_chars {
                pieces.push(line, line_len);
                continue;
            }

            pieces.flush();

            if line_len <= self.max_chars {
                pieces.push(line, line_len);
                continue;
            }

            for sentence in split_sentences(line) {
                let sentence_len = sentence.chars().count();

                if pieces.len + sentence_len > self.max_chars {
                    pieces.flush();

                    if sentence_len > self.max_chars {
                        pieces.done.extend(hard_split(sentence, self.max_chars));
                        continue;
                    }
                }

                pieces.push(sentence, sentence_len);
            }
        }

        pieces.flush();
        pieces.done
    }

    fn merge_small(&self, pieces: Vec<String>) -> Vec<String> {
        let mut iter = pieces.into_iter();
        let Some(mut current) = iter.next() else {
            return Vec::new();
        };
        let mut current_len = current.chars().count();
        let mut merged = Vec::new();

        for next in iter {
            let next_len = next.chars().count();
            if current_len < self.min_chars && current_len + next_len <= self.max_chars {
                current.push_str(&next);
                current_len += next_len;
            } else {
                merged.push(std::mem::replace(&mut current, next));
                current_len = next_len;
            }
        }
        merged.push(current);

        merged
    }
}

/// Chunk under construction plus the finished ones
#[derive(Default)]
struct Pending {
    done: Vec<String>,
    current: String,
    len: usize,
}

impl Pending {
    fn push(&mut self, text: &str, len: usize) {
        self.current.push_str(text);
        self.len += len;
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.done.push(std::mem::take(&mut self.current));
            self.len = 0;
        }
    }
}

/// Split after `.`, `!` or `?` followed by whitespace
///
/// The whitespace stays attached to the preceding sentence, so the pieces
/// concatenate back to the input.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = None;
        while let Some(&(i, next)) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            end = Some(i + next.len_utf8());
            chars.next();
        }
        if let Some(end) = end {
            sentences.push(&text[start..end]);
            start = end;
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Cut `text` into pieces of at most `max_chars` characters
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}
