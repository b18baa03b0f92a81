//! Source-markdown to dialect rendering.
//!
//! The source grammar is line oriented: fenced code blocks and quote runs are
//! recognized first, then each remaining line is scanned for inline
//! constructs. Characters that would be markup in the target dialect are
//! escaped. Constructs the dialect cannot express keep their content and drop
//! their markers.
//!
//! Rendering also records an offset map so callers can tell how much of the
//! source a prefix of the rendered text covers.

pub mod escape;
mod inline;

use tracing::debug;

use crate::dialect::Dialect;
use crate::markers::{Marker, MarkerTable, QuoteMode, Span, SpanKind};
use escape::Context;

/// Rendered text plus its mapping back to source offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    text: String,
    offsets: OffsetMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OffsetMap {
    Identity,
    /// `(rendered_end, source_end)` pairs, ascending in both coordinates.
    Checkpoints(Vec<(usize, usize)>),
}

impl Rendered {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Source byte offset fully covered by `rendered[..pos]`.
    ///
    /// A construct counts as covered only once its closing marker is inside
    /// the prefix.
    pub fn source_offset(&self, pos: usize) -> usize {
        match &self.offsets {
            OffsetMap::Identity => pos.min(self.text.len()),
            OffsetMap::Checkpoints(points) => {
                let idx = points.partition_point(|&(rendered, _)| rendered <= pos);
                idx.checked_sub(1).map_or(0, |i| points[i].1)
            }
        }
    }
}

/// Renders `source` for the dialect described by `table`.
pub fn render(source: &str, table: &MarkerTable) -> Rendered {
    if table.dialect() == Dialect::Plain {
        return Rendered {
            text: source.to_string(),
            offsets: OffsetMap::Identity,
        };
    }

    let mut em = Emitter::new(table, source.len());
    for block in blocks(source) {
        match block {
            Block::Text { text, at } => emit_lines(&mut em, text, at),
            Block::Fence {
                lang,
                body,
                body_at,
                end,
            } => emit_fence(&mut em, lang, body, body_at, end),
            Block::Quote { mode, lines } => emit_quote(&mut em, mode, &lines),
        }
    }
    em.checkpoint(source.len());

    if em.degraded > 0 {
        debug!(
            dialect = %table.dialect(),
            markers = em.degraded,
            "unpaired markers rendered as text"
        );
    }
    em.finish()
}

/// Output buffer that tracks open spans and source checkpoints.
pub(crate) struct Emitter<'t> {
    table: &'t MarkerTable,
    out: String,
    checkpoints: Vec<(usize, usize)>,
    open_kinds: Vec<SpanKind>,
    degraded: usize,
}

impl<'t> Emitter<'t> {
    fn new(table: &'t MarkerTable, capacity: usize) -> Self {
        Self {
            table,
            out: String::with_capacity(capacity + capacity / 4),
            checkpoints: Vec::new(),
            open_kinds: Vec::new(),
            degraded: 0,
        }
    }

    fn dialect(&self) -> Dialect {
        self.table.dialect()
    }

    /// Escaped text whose characters are individually mapped to the source.
    fn literal(&mut self, text: &str, at: usize, context: Context) {
        let dialect = self.dialect();
        for (offset, ch) in text.char_indices() {
            escape::push_escaped(&mut self.out, dialect, context, ch);
            self.checkpoint(at + offset + ch.len_utf8());
        }
    }

    /// Escaped text that only counts as consumed with its enclosing construct.
    fn literal_unmapped(&mut self, text: &str, context: Context) {
        let dialect = self.dialect();
        for ch in text.chars() {
            escape::push_escaped(&mut self.out, dialect, context, ch);
        }
    }

    /// Writes markup as is. In MarkdownV2 a `_` marker right after another
    /// `_` is set apart with `\r` so the pair is not read as underline.
    fn raw(&mut self, text: &str) {
        if self.dialect() == Dialect::MarkdownV2
            && self.out.ends_with('_')
            && text.starts_with('_')
        {
            self.out.push('\r');
        }
        self.out.push_str(text);
    }

    fn checkpoint(&mut self, source_end: usize) {
        if let Some(last) = self.checkpoints.last_mut()
            && last.0 == self.out.len()
        {
            last.1 = last.1.max(source_end);
            return;
        }
        self.checkpoints.push((self.out.len(), source_end));
    }

    /// Writes the opening marker for `span`. Returns whether markers were
    /// written; when they were not, the span's content is emitted bare.
    ///
    /// A kind already open is never reopened inside itself, and dialects
    /// without nesting get markers for the outermost span only.
    fn open(&mut self, span: &Span) -> bool {
        let kind = span.kind();
        let nested = !self.open_kinds.is_empty();
        if self.open_kinds.contains(&kind) || (nested && !self.table.allows_nesting()) {
            return false;
        }
        match self.table.opener(span) {
            Some(marker) => {
                self.raw(&marker);
                self.open_kinds.push(kind);
                true
            }
            None => false,
        }
    }

    fn close(&mut self, span: &Span, opened: bool, source_end: usize) {
        if opened {
            if let Some(marker) = self.table.closer(span) {
                self.raw(&marker);
            }
            self.open_kinds.pop();
        }
        self.checkpoint(source_end);
    }

    fn finish(self) -> Rendered {
        Rendered {
            text: self.out,
            offsets: OffsetMap::Checkpoints(self.checkpoints),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Block<'s> {
    Text {
        text: &'s str,
        at: usize,
    },
    Fence {
        lang: &'s str,
        body: &'s str,
        body_at: usize,
        end: usize,
    },
    Quote {
        mode: QuoteMode,
        lines: Vec<QuoteLine<'s>>,
    },
}

#[derive(Debug, PartialEq, Eq)]
struct QuoteLine<'s> {
    /// Source prefix, including the optional space after it.
    prefix: &'s str,
    prefix_at: usize,
    content: &'s str,
    content_at: usize,
    newline: bool,
}

/// Splits `source` into fenced code, quote runs and ordinary text.
fn blocks(source: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < source.len() {
        let at_line_start = pos == 0 || source.as_bytes()[pos - 1] == b'\n';
        if at_line_start {
            if let Some((fence, end)) = fence_at(source, pos) {
                push_text(&mut blocks, source, text_start, pos);
                blocks.push(fence);
                pos = end;
                text_start = pos;
                continue;
            }
            if source[pos..].starts_with('>') {
                push_text(&mut blocks, source, text_start, pos);
                let (quote, end) = quote_run(source, pos);
                blocks.push(quote);
                pos = end;
                text_start = pos;
                continue;
            }
        }
        pos = line_end(source, pos);
    }
    push_text(&mut blocks, source, text_start, source.len());
    blocks
}

fn push_text<'s>(blocks: &mut Vec<Block<'s>>, source: &'s str, from: usize, to: usize) {
    if to > from {
        blocks.push(Block::Text {
            text: &source[from..to],
            at: from,
        });
    }
}

/// Offset just past the line containing `pos`, including its newline.
fn line_end(source: &str, pos: usize) -> usize {
    source[pos..].find('\n').map_or(source.len(), |i| pos + i + 1)
}

fn fence_at(source: &str, pos: usize) -> Option<(Block<'_>, usize)> {
    let rest = source[pos..].strip_prefix("```")?;
    let lang_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'+' | b'-'))
        .count();
    if rest.as_bytes().get(lang_len) != Some(&b'\n') {
        return None;
    }
    let body_at = pos + 3 + lang_len + 1;
    let close = source[body_at..].find("```")?;
    let end = body_at + close + 3;
    let fence = Block::Fence {
        lang: &rest[..lang_len],
        body: &source[body_at..body_at + close],
        body_at,
        end,
    };
    Some((fence, end))
}

fn quote_run(source: &str, start: usize) -> (Block<'_>, usize) {
    let mode = if source[start..].starts_with(">>") {
        QuoteMode::Expandable
    } else {
        QuoteMode::Regular
    };
    let marker = match mode {
        QuoteMode::Expandable => ">>",
        QuoteMode::Regular => ">",
    };

    let mut lines = Vec::new();
    let mut pos = start;
    while pos < source.len() && source[pos..].starts_with('>') {
        let end = line_end(source, pos);
        let newline = source.as_bytes()[end - 1] == b'\n';
        let line = &source[pos..if newline { end - 1 } else { end }];

        let mut prefix_len = if line.starts_with(marker) { marker.len() } else { 1 };
        if line[prefix_len..].starts_with(' ') {
            prefix_len += 1;
        }
        lines.push(QuoteLine {
            prefix: &line[..prefix_len],
            prefix_at: pos,
            content: &line[prefix_len..],
            content_at: pos + prefix_len,
            newline,
        });
        pos = end;
    }
    (Block::Quote { mode, lines }, pos)
}

fn emit_lines(em: &mut Emitter<'_>, text: &str, at: usize) {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        inline::emit(em, content, at + offset);
        if content.len() < line.len() {
            em.literal("\n", at + offset + content.len(), Context::Text);
        }
        offset += line.len();
    }
}

fn emit_fence(em: &mut Emitter<'_>, lang: &str, body: &str, body_at: usize, end: usize) {
    let span = Span::CodeBlock {
        lang: (!lang.is_empty()).then(|| lang.to_string()),
    };
    let opened = em.open(&span);
    let context = if opened { Context::Code } else { Context::Text };
    em.literal(body, body_at, context);
    em.close(&span, opened, end);
}

fn emit_quote(em: &mut Emitter<'_>, mode: QuoteMode, lines: &[QuoteLine<'_>]) {
    let last = lines.len().saturating_sub(1);
    match *em.table.marker(mode.kind()) {
        Marker::LinePrefix { first, rest, end } => {
            for (i, line) in lines.iter().enumerate() {
                em.raw(if i == 0 { first } else { rest });
                inline::emit(em, line.content, line.content_at);
                if i == last {
                    em.raw(end);
                }
                emit_line_break(em, line);
            }
        }
        Marker::Paired { .. } | Marker::Payload { .. } => {
            let span = match mode {
                QuoteMode::Regular => Span::BlockQuote,
                QuoteMode::Expandable => Span::BlockQuoteExpandable,
            };
            let opened = em.open(&span);
            for (i, line) in lines.iter().enumerate() {
                inline::emit(em, line.content, line.content_at);
                if i == last {
                    let content_end = line.content_at + line.content.len();
                    em.close(&span, opened, content_end);
                }
                emit_line_break(em, line);
            }
        }
        Marker::Unsupported => {
            for line in lines {
                em.literal(line.prefix, line.prefix_at, Context::Text);
                inline::emit(em, line.content, line.content_at);
                emit_line_break(em, line);
            }
        }
    }
}

fn emit_line_break(em: &mut Emitter<'_>, line: &QuoteLine<'_>) {
    if line.newline {
        em.literal("\n", line.content_at + line.content.len(), Context::Text);
    }
}
