
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 512;
pub const DEFAULT_CHUNK_OVERLAP: usize = 10;

const CHARACTER_SEPARATOR: &str = "";

/// Represents a chunk of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text, trimmed of surrounding whitespace
    pub content: String,
    /// The index of this chunk within the document
    pub chunk_index: usize,
    /// Byte offset of `content` within the source text
    pub start_offset: usize,
    /// Length of `content` in characters
    pub char_count: usize,
}

impl TextChunk {
    /// Byte offset one past the end of `content` within the source text
    #[inline]
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.content.len()
    }
}

/// Configuration for text chunking
///
/// Sizes are measured in characters, not bytes, so multi-byte scripts get the
/// same budget as ASCII text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between the end of one chunk and the start of the next
    pub chunk_overlap: usize,
    /// Split boundaries, tried in order from coarsest to finest
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: default_separators(),
        }
    }
}

/// Paragraph, line, sentence, word, then single characters
#[inline]
pub fn default_separators() -> Vec<String> {
    ["\n\n", "\n", ". ", " ", ""]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A contiguous byte range of the source text and its length in characters
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// Split text into overlapping chunks of at most `chunk_size` characters
///
/// Larger boundaries are preferred: a separator is only used on the parts
/// that are still too long after splitting on the coarser ones. Parts that
/// outlast every configured separator are cut on characters.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let separators: Vec<&str> = config.separators.iter().map(String::as_str).collect();
    let whole = Piece {
        start: 0,
        end: text.len(),
        chars: text.chars().count(),
    };

    let mut spans = Vec::new();
    split_recursive(text, whole, &separators, config, &mut spans);

    let chunks: Vec<TextChunk> = spans
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (start, end))| {
            let content = slice(text, start, end).to_string();
            TextChunk {
                char_count: content.chars().count(),
                content,
                chunk_index,
                start_offset: start,
            }
        })
        .collect();

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        whole.chars,
        chunks.len(),
        config.chunk_size,
        config.chunk_overlap
    );

    chunks
}

fn split_recursive(
    text: &str,
    range: Piece,
    separators: &[&str],
    config: &ChunkingConfig,
    spans: &mut Vec<(usize, usize)>,
) {
    let segment = slice(text, range.start, range.end);

    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || segment.contains(sep));

    let (pieces, remaining) = match position {
        Some(i) => (
            split_keep_separator(text, range, separators[i]),
            &separators[i + 1..],
        ),
        None => (vec![range], &separators[separators.len()..]),
    };
    let split_by_character = position.is_some_and(|i| separators[i].is_empty());

    let mut fitting = Vec::new();
    for piece in pieces {
        if piece.chars <= config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            merge_pieces(text, &fitting, config, spans);
            fitting.clear();
        }

        if !remaining.is_empty() {
            split_recursive(text, piece, remaining, config, spans);
        } else if split_by_character {
            // Only reachable with a zero chunk size
            push_trimmed(text, piece.start, piece.end, spans);
        } else {
            // Configured separators are exhausted; cut on characters
            split_recursive(text, piece, &[CHARACTER_SEPARATOR], config, spans);
        }
    }

    if !fitting.is_empty() {
        merge_pieces(text, &fitting, config, spans);
    }
}

/// Split `range` on `separator`, keeping each separator at the end of the piece before it
fn split_keep_separator(text: &str, range: Piece, separator: &str) -> Vec<Piece> {
    let segment = slice(text, range.start, range.end);

    if separator.is_empty() {
        return segment
            .char_indices()
            .map(|(i, c)| Piece {
                start: range.start + i,
                end: range.start + i + c.len_utf8(),
                chars: 1,
            })
            .collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in segment.match_indices(separator) {
        let end = idx + separator.len();
        pieces.push(make_piece(text, range.start + last, range.start + end));
        last = end;
    }
    if last < segment.len() {
        pieces.push(make_piece(text, range.start + last, range.end));
    }

    pieces
}

/// Greedily pack pieces into windows of at most `chunk_size` characters
///
/// When a window is emitted, pieces are dropped from its front until what is
/// left fits in `chunk_overlap`; those pieces open the next window.
fn merge_pieces(
    text: &str,
    pieces: &[Piece],
    config: &ChunkingConfig,
    spans: &mut Vec<(usize, usize)>,
) {
    let mut window: VecDeque<Piece> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        if total + piece.chars > config.chunk_size && !window.is_empty() {
            emit_window(text, &window, spans);

            while total > config.chunk_overlap
                || (total + piece.chars > config.chunk_size && total > 0)
            {
                let Some(front) = window.pop_front() else {
                    break;
                };
                total -= front.chars;
            }
        }

        window.push_back(piece);
        total += piece.chars;
    }

    emit_window(text, &window, spans);
}

fn emit_window(text: &str, window: &VecDeque<Piece>, spans: &mut Vec<(usize, usize)>) {
    if let (Some(first), Some(last)) = (window.front(), window.back()) {
        push_trimmed(text, first.start, last.end, spans);
    }
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
    let raw = slice(text, start, end);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }

    let chunk_start = start + (raw.len() - raw.trim_start().len());
    spans.push((chunk_start, chunk_start + trimmed.len()));
}

fn make_piece(text: &str, start: usize, end: usize) -> Piece {
    Piece {
        start,
        end,
        chars: slice(text, start, end).chars().count(),
    }
}

#[expect(
    clippy::string_slice,
    reason = "offsets always come from char_indices or match_indices"
)]
fn slice(text: &str, start: usize, end: usize) -> &str {
    &text[start..end]
}
