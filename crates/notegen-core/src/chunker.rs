//! Transcript chunking.
//!
//! Splits preprocessed transcript text into an ordered sequence of chunks, each
//! roughly bounded by a maximum size. Units are the stretches of text ending in
//! the delimiter character (the delimiter stays attached to its unit), so
//! concatenating the chunks in order gives back the input exactly.
//!
//! The bound is soft: a single unit longer than the maximum is emitted as one
//! oversized chunk rather than being cut.

/// Default maximum chunk size, in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 8000;

/// Default unit delimiter.
pub const DEFAULT_DELIMITER: char = '.';

/// Greedy delimiter-based chunker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_size: usize,
    delimiter: char,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE)
    }
}

impl Chunker {
    /// Create a chunker with the given maximum size and the default delimiter.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            delimiter: DEFAULT_DELIMITER,
        }
    }

    /// Use a different unit delimiter.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Split `text` into chunks.
    ///
    /// A buffer is closed when appending the next unit would make it reach or
    /// exceed `max_size`; the unit then starts the next buffer. Empty input
    /// yields no chunks, and no chunk is ever empty.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0usize;

        for unit in text.split_inclusive(self.delimiter) {
            let unit_len = unit.chars().count();

            if buffer_len > 0 && buffer_len + unit_len >= self.max_size {
                chunks.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }

            buffer.push_str(unit);
            buffer_len += unit_len;
        }

        if !buffer.is_empty() {
            chunks.push(buffer);
        }

        chunks
    }
}

/// Split `text` with the default delimiter.
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    Chunker::new(max_size).chunk(text)
}
