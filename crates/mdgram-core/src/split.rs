//! Length-bounded splitting of rendered text.
//!
//! Lengths are counted in `char`s. Every boundary lands on a grapheme
//! cluster boundary when one is available, and never inside an escape, tag,
//! entity, multi-character marker or link if the chunk can be shortened
//! instead. Multi-line blocks (code blocks, quotes) are cut on their own line
//! breaks, or kept whole when they fit in one chunk.

use std::ops::Range;

use tracing::debug;
use unicode_segmentation::GraphemeCursor;

use crate::balance::{SpanTracker, Token, TokenKind};
use crate::config::ChunkingConfig;
use crate::markers::{MarkerTable, SpanKind};

/// A slice of rendered text, before balancing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub text: &'a str,
    /// Byte range within the rendered text.
    pub range: Range<usize>,
}

impl Chunk<'_> {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits rendered `text` into chunks of at most `max_chunk_chars` chars.
pub fn split<'a>(text: &'a str, table: &MarkerTable, config: &ChunkingConfig) -> Vec<Chunk<'a>> {
    let max = config.max_chunk_chars.max(1);
    let layout = Layout::scan(text, table);

    let mut chunks = Vec::new();
    let mut cursor = 0;
    while cursor < text.len() {
        let end = boundary(text, cursor, max, config.lookback_chars, &layout);
        debug_assert!(end > cursor && text.is_char_boundary(end));
        debug_assert!(text[cursor..end].chars().count() <= max);
        chunks.push(Chunk {
            text: &text[cursor..end],
            range: cursor..end,
        });
        cursor = end;
    }

    debug!(
        dialect = %table.dialect(),
        chunks = chunks.len(),
        blocks = layout.blocks.len(),
        "split rendered text"
    );
    chunks
}

/// Picks the end of the chunk starting at `cursor`.
fn boundary(text: &str, cursor: usize, max: usize, lookback: usize, layout: &Layout) -> usize {
    let naive = advance_chars(text, cursor, max);
    if naive >= text.len() {
        return text.len();
    }
    let window = retreat_chars(text, naive, lookback).max(cursor);

    let mut end = match layout.block_containing(naive) {
        Some(block) if block.start > cursor && text[block.clone()].chars().count() <= max => {
            block.start
        }
        Some(block) => {
            let from = window.max(block.start);
            last_break(text, from, naive, &['\n']).unwrap_or(naive)
        }
        None => last_break(text, window, naive, &['\n', ' ']).unwrap_or(naive),
    };
    if end <= cursor {
        end = naive;
    }

    let snapped = grapheme_floor(text, end);
    if snapped > cursor {
        end = snapped;
    }
    if let Some(start) = layout.atom_start_containing(end, cursor) {
        end = start;
    }
    end
}

/// Offset just after the last of `breaks` in `text[from..to]`.
fn last_break(text: &str, from: usize, to: usize, breaks: &[char]) -> Option<usize> {
    text[from..to]
        .rfind(breaks)
        .map(|idx| from + idx + 1)
}

fn advance_chars(text: &str, from: usize, count: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(count)
        .map_or(text.len(), |(idx, _)| from + idx)
}

fn retreat_chars(text: &str, from: usize, count: usize) -> usize {
    if count == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(count - 1)
        .map_or(0, |(idx, _)| idx)
}

fn grapheme_floor(text: &str, pos: usize) -> usize {
    let mut cursor = GraphemeCursor::new(pos, text.len(), true);
    match cursor.is_boundary(text, 0) {
        Ok(false) => cursor.prev_boundary(text, 0).ok().flatten().unwrap_or(pos),
        Ok(true) | Err(_) => pos,
    }
}

/// Block and atom ranges of a rendered text.
#[derive(Debug, Default)]
struct Layout {
    blocks: Vec<Range<usize>>,
    atoms: Vec<Range<usize>>,
}

impl Layout {
    fn scan(text: &str, table: &MarkerTable) -> Self {
        let tokens = SpanTracker::new(table).scan(text);
        let mut layout = Layout::default();
        let mut open_blocks: Vec<(SpanKind, usize)> = Vec::new();
        let mut open_links: Vec<usize> = Vec::new();
        let mut quotes = QuoteRuns::default();

        for Token { range, kind } in tokens {
            if !matches!(kind, TokenKind::Text | TokenKind::Newline) && range.len() > 1 {
                layout.atoms.push(range.clone());
            }
            if let Some(run) = quotes.observe(kind, &range) {
                layout.blocks.push(run);
            }
            match kind {
                TokenKind::Open(SpanKind::Link) => open_links.push(range.start),
                TokenKind::Close(SpanKind::Link) => {
                    if let Some(start) = open_links.pop() {
                        layout.atoms.push(start..range.end);
                    }
                }
                TokenKind::Open(block) if is_block(block) => open_blocks.push((block, range.start)),
                TokenKind::Close(block) if is_block(block) => {
                    if let Some(idx) = open_blocks.iter().rposition(|(open, _)| *open == block) {
                        let (_, start) = open_blocks.remove(idx);
                        layout.blocks.push(start..range.end);
                    }
                }
                _ => {}
            }
        }
        if let Some(run) = quotes.finish(text.len()) {
            layout.blocks.push(run);
        }
        layout.blocks.sort_by_key(|block| block.start);
        layout
    }

    fn block_containing(&self, pos: usize) -> Option<Range<usize>> {
        self.blocks
            .iter()
            .find(|block| block.start < pos && pos < block.end)
            .cloned()
    }

    /// Earliest start after `cursor` of an atom that `pos` would cut.
    fn atom_start_containing(&self, pos: usize, cursor: usize) -> Option<usize> {
        self.atoms
            .iter()
            .filter(|atom| atom.start < pos && pos < atom.end && atom.start > cursor)
            .map(|atom| atom.start)
            .min()
    }
}

fn is_block(kind: SpanKind) -> bool {
    kind == SpanKind::CodeBlock || kind.is_quote()
}

/// Groups consecutive prefixed lines into one range.
#[derive(Debug, Default)]
struct QuoteRuns {
    start: Option<usize>,
    end: usize,
    line_quoted: bool,
    line_begins: bool,
}

impl QuoteRuns {
    fn observe(&mut self, kind: TokenKind, range: &Range<usize>) -> Option<Range<usize>> {
        let mut finished = None;
        if self.line_begins {
            self.line_begins = false;
            if !matches!(kind, TokenKind::LinePrefix(_))
                && let Some(start) = self.start.take()
            {
                finished = Some(start..self.end);
            }
        }
        match kind {
            TokenKind::LinePrefix(_) => {
                self.start.get_or_insert(range.start);
                self.line_quoted = true;
            }
            TokenKind::Newline => {
                if self.line_quoted {
                    self.end = range.end;
                }
                self.line_quoted = false;
                self.line_begins = true;
            }
            _ => {}
        }
        finished
    }

    fn finish(&mut self, len: usize) -> Option<Range<usize>> {
        let start = self.start.take()?;
        Some(start..if self.line_quoted { len } else { self.end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_chars: max,
            lookback_chars: 200,
        }
    }

    fn texts<'a>(chunks: &[Chunk<'a>]) -> Vec<&'a str> {
        chunks.iter().map(|chunk| chunk.text).collect()
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split("hello", &MarkerTable::HTML, &config(100));
        assert_eq!(texts(&chunks), vec!["hello"]);
        assert_eq!(chunks[0].range, 0..5);
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(split("", &MarkerTable::HTML, &config(10)).is_empty());
    }

    #[test]
    fn prefers_spaces_and_newlines() {
        let chunks = split("alpha beta gamma", &MarkerTable::PLAIN, &config(12));
        assert_eq!(texts(&chunks), vec!["alpha beta ", "gamma"]);

        let chunks = split("one two\nthree", &MarkerTable::PLAIN, &config(10));
        assert_eq!(texts(&chunks), vec!["one two\n", "three"]);
    }

    #[test]
    fn hard_cuts_runs_without_breaks() {
        let text = "x".repeat(25);
        let chunks = split(&text, &MarkerTable::PLAIN, &config(10));
        assert_eq!(
            chunks.iter().map(Chunk::char_len).collect::<Vec<_>>(),
            vec![10, 10, 5]
        );
    }

    #[test]
    fn counts_chars_not_bytes() {
        let text = "é".repeat(12);
        let chunks = split(&text, &MarkerTable::PLAIN, &config(5));
        assert!(chunks.iter().all(|chunk| chunk.char_len() <= 5));
        assert_eq!(chunks.concat_texts(), text);
    }

    #[test]
    fn keeps_grapheme_clusters_together() {
        // "e" followed by a combining acute accent is one cluster.
        let text = "aaaa e\u{301}e\u{301}";
        let config = ChunkingConfig {
            max_chunk_chars: 6,
            lookback_chars: 0,
        };
        let chunks = split(text, &MarkerTable::PLAIN, &config);
        assert_eq!(texts(&chunks), vec!["aaaa ", "e\u{301}e\u{301}"]);
    }

    #[test]
    fn does_not_cut_inside_entities_or_escapes() {
        let chunks = split("aaaaaaa&amp;b", &MarkerTable::HTML, &config(10));
        assert_eq!(texts(&chunks), vec!["aaaaaaa", "&amp;b"]);

        let chunks = split("aaaaaaaaa\\.b", &MarkerTable::MARKDOWN_V2, &config(10));
        assert_eq!(texts(&chunks), vec!["aaaaaaaaa", "\\.b"]);
    }

    #[test]
    fn block_that_fits_moves_to_next_chunk() {
        let text = "intro text\n<pre>line one\nline two</pre>";
        let chunks = split(text, &MarkerTable::HTML, &config(32));
        assert_eq!(texts(&chunks), vec!["intro text\n", "<pre>line one\nline two</pre>"]);
    }

    #[test]
    fn oversized_block_is_cut_on_its_own_newlines() {
        let text = "<pre>aaaa\nbbbb\ncccc\ndddd</pre>";
        let chunks = split(text, &MarkerTable::HTML, &config(16));
        assert_eq!(texts(&chunks)[0], "<pre>aaaa\nbbbb\n");
        assert_eq!(chunks.concat_texts(), text);
    }

    #[test]
    fn quote_runs_are_blocks() {
        let text = "lead\n>one\n>two\ntail";
        let chunks = split(text, &MarkerTable::MARKDOWN_V2, &config(12));
        assert_eq!(texts(&chunks)[..2], ["lead\n", ">one\n>two\n"]);
        assert_eq!(chunks.concat_texts(), text);
    }

    trait ConcatTexts {
        fn concat_texts(&self) -> String;
    }

    impl ConcatTexts for Vec<Chunk<'_>> {
        fn concat_texts(&self) -> String {
            self.iter().map(|chunk| chunk.text).collect()
        }
    }
}
