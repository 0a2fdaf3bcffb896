//! Recursive character splitter.
//!
//! Splits on the coarsest separator present (paragraphs, then lines, then words), packs pieces
//! into chunks of at most `chunk_size` chars, and recurses with finer separators for pieces that
//! are still too long. The empty separator means "hard cut by chars".

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Chunks in document order. Every chunk is non-empty and at most `chunk_size` chars.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    /// First chunk only; empty if the text has no non-whitespace content.
    pub fn first_chunk(&self, text: &str) -> String {
        self.split(text).into_iter().next().unwrap_or_default()
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()));
        let Some(idx) = idx.filter(|&i| !separators[i].is_empty()) else {
            return hard_chunks(text, self.chunk_size);
        };
        let sep = separators[idx].as_str();
        let finer = &separators[idx + 1..];
        let sep_len = sep.chars().count();

        let mut out = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for piece in text.split(sep) {
            let piece_len = piece.chars().count();
            if piece_len > self.chunk_size {
                flush(&mut out, &mut current, sep);
                current_len = 0;
                out.extend(self.split_with(piece, finer));
                continue;
            }
            let joined_len = if current.is_empty() {
                piece_len
            } else {
                current_len + sep_len + piece_len
            };
            if joined_len > self.chunk_size {
                flush(&mut out, &mut current, sep);
                current.push(piece);
                current_len = piece_len;
            } else {
                current.push(piece);
                current_len = joined_len;
            }
        }
        flush(&mut out, &mut current, sep);
        out
    }
}

fn flush(out: &mut Vec<String>, current: &mut Vec<&str>, sep: &str) {
    if current.is_empty() {
        return;
    }
    let joined = current.join(sep);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

fn hard_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|c| c.iter().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// First `n` chars of `s`.
pub fn char_prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
