//! Note chunking
//!
//! Generated notes are split into small chunks before embedding so that a
//! query retrieves only the relevant part of a long summary.

use text_splitter::{ChunkConfig, MarkdownSplitter};
use tracing::debug;

/// How notes are cut into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingStrategy {
    /// Fixed number of sentences per chunk
    Sentences(usize),
    /// Markdown-aware chunks of at most this many characters
    Markdown(usize),
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        ChunkingStrategy::Sentences(5)
    }
}

/// Split text according to the strategy, dropping blank chunks
pub fn chunk_notes(text: &str, strategy: ChunkingStrategy) -> Vec<String> {
    match strategy {
        ChunkingStrategy::Sentences(n) => chunk_by_sentences(text, n),
        ChunkingStrategy::Markdown(max_chars) => chunk_markdown(text, max_chars),
    }
}

/// Byte ranges of sentences. A sentence ends at `.`, `!` or `?` followed by
/// whitespace (or the end of the text), or at a line break.
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        let end = i + ch.len_utf8();
        let boundary = match ch {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            spans.push((start, end));
            start = end;
        }
    }
    if start < text.len() {
        spans.push((start, text.len()));
    }

    spans.retain(|&(s, e)| !text[s..e].trim().is_empty());
    spans
}

/// Group every `n` sentences into one chunk
///
/// Chunks keep the original text between their first and last sentence, so
/// headings and bullet points survive. `n == 0` is treated as 1.
pub fn chunk_by_sentences(text: &str, n: usize) -> Vec<String> {
    let spans = sentence_spans(text);
    let chunks: Vec<String> = spans
        .chunks(n.max(1))
        .filter_map(|group| {
            let (first, last) = (group.first()?, group.last()?);
            let chunk = text[first.0..last.1].trim();
            (!chunk.is_empty()).then(|| chunk.to_string())
        })
        .collect();

    debug!(
        input_len = text.len(),
        sentences = spans.len(),
        chunk_count = chunks.len(),
        "Notes chunked by sentence count"
    );
    chunks
}

/// Split markdown notes at structural boundaries (headings, lists, paragraphs)
pub fn chunk_markdown(text: &str, max_chars: usize) -> Vec<String> {
    let splitter = MarkdownSplitter::new(ChunkConfig::new(max_chars.max(1)));
    let chunks: Vec<String> = splitter
        .chunks(text)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();

    debug!(
        input_len = text.len(),
        chunk_count = chunks.len(),
        max_chars,
        "Notes chunked as markdown"
    );
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_sentences() {
        let text = "One. Two! Three? Four. Five. Six. Seven.";
        let chunks = chunk_by_sentences(text, 5);
        assert_eq!(chunks, vec!["One. Two! Three? Four. Five.", "Six. Seven."]);
    }

    #[test]
    fn test_line_breaks_end_sentences() {
        let text = "# Heading\n\n- first point\n- second point\n";
        let chunks = chunk_by_sentences(text, 2);
        assert_eq!(chunks, vec!["# Heading\n\n- first point", "- second point"]);
    }

    #[test]
    fn test_decimal_points_do_not_split() {
        let chunks = chunk_by_sentences("Pi is 3.14 roughly. Next.", 1);
        assert_eq!(chunks, vec!["Pi is 3.14 roughly.", "Next."]);
    }

    #[test]
    fn test_blank_text_yields_no_chunks() {
        assert!(chunk_by_sentences("", 5).is_empty());
        assert!(chunk_by_sentences("  \n\n \t ", 5).is_empty());
        assert!(chunk_markdown("   ", 100).is_empty());
    }

    #[test]
    fn test_zero_sentence_count_is_one() {
        assert_eq!(chunk_by_sentences("A. B.", 0).len(), 2);
    }

    #[test]
    fn test_markdown_chunks_respect_size() {
        let section = "## Topic\n\nSome sentence about the topic that goes on a while.\n\n";
        let text = section.repeat(20);
        let chunks = chunk_markdown(&text, 120);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 120);
        }
    }

    #[test]
    fn test_strategy_dispatch() {
        let text = "A. B. C.";
        assert_eq!(chunk_notes(text, ChunkingStrategy::Sentences(2)).len(), 2);
        assert_eq!(chunk_notes(text, ChunkingStrategy::Markdown(1000)), vec!["A. B. C."]);
    }
}
