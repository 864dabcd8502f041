/*!
 * Token-aware chunking of page text into bounded translation units.
 *
 * Three strategies are supported:
 * - token_bound: greedy sentence packing under the token ceiling
 * - semantic: whole blank-line-delimited paragraphs under the ceiling,
 *   falling back to sentence packing only when a single paragraph alone
 *   exceeds it
 * - hybrid: semantic packing first, then token-bound re-chunking of any
 *   unit that still exceeds the ceiling
 *
 * Chunking is deterministic: identical input and strategy yield
 * byte-identical chunk sequences. Content is never dropped; a single
 * sentence larger than the ceiling is still emitted as its own
 * oversized chunk.
 */

use crate::models::{Chunk, ChunkKind, ChunkStrategy, PageText};

/// Estimate the token count of a text span.
///
/// Deterministic approximation (roughly four characters per token for
/// English prose); the pipeline only needs a stable, monotone measure
/// to pack chunks and estimate cost, not exact tokenizer output.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    let words = text.split_whitespace().count();
    if chars == 0 {
        return 0;
    }
    std::cmp::max(words, chars.div_ceil(4))
}

/// Split text into sentences. A sentence ends at `.`, `!` or `?`
/// followed by whitespace and an uppercase letter or digit.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let boundary = i + c.len_utf8();
        if boundary <= start {
            continue;
        }
        let rest = &text[boundary..];
        let ws_len: usize = rest
            .chars()
            .take_while(|ch| ch.is_whitespace())
            .map(|ch| ch.len_utf8())
            .sum();
        if ws_len == 0 {
            continue;
        }
        let next = rest[ws_len..].chars().next();
        if matches!(next, Some(ch) if ch.is_uppercase() || ch.is_numeric()) {
            let sentence = text[start..boundary].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = boundary + ws_len;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Splits page text into bounded translation units
#[derive(Debug, Clone)]
pub struct Chunker {
    /// Token ceiling per unit
    max_unit_tokens: usize,
}

/// A packed unit before document-level identity is assigned
struct Unit {
    text: String,
    kind: ChunkKind,
}

impl Chunker {
    pub fn new(max_unit_tokens: usize) -> Self {
        Self {
            max_unit_tokens: std::cmp::max(1, max_unit_tokens),
        }
    }

    /// Chunk all pages of a document under the given strategy.
    ///
    /// Chunk ordinals are global across the document and ids are
    /// deterministic, so repeated runs over identical input are
    /// byte-identical. An empty page contributes zero chunks.
    pub fn chunk(
        &self,
        document_id: &str,
        pages: &[PageText],
        strategy: ChunkStrategy,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut ordinal = 0;

        for page in pages {
            let units = match strategy {
                ChunkStrategy::TokenBound => self.pack_sentences(&page.text),
                ChunkStrategy::Semantic => self.pack_paragraphs(&page.text, true),
                ChunkStrategy::Hybrid => self.pack_hybrid(&page.text),
            };

            for unit in units {
                let token_count = estimate_tokens(&unit.text);
                chunks.push(Chunk {
                    id: format!("{}:{:04}", document_id, ordinal),
                    document_id: document_id.to_string(),
                    page_number: page.page_number,
                    ordinal,
                    text: unit.text,
                    token_count,
                    kind: unit.kind,
                });
                ordinal += 1;
            }
        }

        chunks
    }

    /// Greedy sentence packing. Never splits a sentence; a sentence
    /// alone over the ceiling becomes its own oversized unit.
    fn pack_sentences(&self, text: &str) -> Vec<Unit> {
        let sentences = split_sentences(text);
        let mut units = Vec::new();
        let mut buf: Vec<&str> = Vec::new();
        let mut buf_tokens = 0;

        for sentence in sentences {
            let tokens = estimate_tokens(sentence);
            if !buf.is_empty() && buf_tokens + tokens > self.max_unit_tokens {
                units.push(Unit {
                    text: buf.join(" "),
                    kind: ChunkKind::TokenBound,
                });
                buf.clear();
                buf_tokens = 0;
            }
            buf.push(sentence);
            buf_tokens += tokens;
        }

        if !buf.is_empty() {
            units.push(Unit {
                text: buf.join(" "),
                kind: ChunkKind::TokenBound,
            });
        }
        units
    }

    /// Paragraph packing under the token ceiling. When
    /// `sentence_fallback` is set, a single paragraph over the ceiling
    /// is sentence-split; otherwise it is emitted whole.
    fn pack_paragraphs(&self, text: &str, sentence_fallback: bool) -> Vec<Unit> {
        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut units = Vec::new();
        let mut buf: Vec<&str> = Vec::new();
        let mut buf_tokens = 0;

        let mut flush = |buf: &mut Vec<&str>, buf_tokens: &mut usize, units: &mut Vec<Unit>| {
            if buf.is_empty() {
                return;
            }
            units.push(Unit {
                text: buf.join("\n\n"),
                kind: ChunkKind::Semantic,
            });
            buf.clear();
            *buf_tokens = 0;
        };

        for paragraph in paragraphs {
            let tokens = estimate_tokens(paragraph);

            if tokens > self.max_unit_tokens && sentence_fallback {
                // An oversized paragraph cannot be packed; close the
                // buffer and fall back to sentence-level splitting.
                flush(&mut buf, &mut buf_tokens, &mut units);
                units.extend(self.pack_sentences(paragraph));
                continue;
            }

            if !buf.is_empty() && buf_tokens + tokens > self.max_unit_tokens {
                flush(&mut buf, &mut buf_tokens, &mut units);
            }
            buf.push(paragraph);
            buf_tokens += tokens;
            if buf_tokens >= self.max_unit_tokens {
                flush(&mut buf, &mut buf_tokens, &mut units);
            }
        }

        flush(&mut buf, &mut buf_tokens, &mut units);
        units
    }

    /// Semantic packing first, then token-bound re-chunking of any unit
    /// still over the ceiling.
    fn pack_hybrid(&self, text: &str) -> Vec<Unit> {
        let mut units = Vec::new();
        for unit in self.pack_paragraphs(text, false) {
            if estimate_tokens(&unit.text) > self.max_unit_tokens {
                units.extend(self.pack_sentences(&unit.text));
            } else {
                units.push(unit);
            }
        }
        units
    }
}
