//! Tag balancing for rendered chunks.
//!
//! A chunk cut out of rendered text may start inside spans opened by an
//! earlier chunk and may end with spans still open. [`SpanTracker`] reopens
//! the inherited spans, scans the chunk, and closes whatever is left so each
//! chunk stands on its own. The state after the scan is the [`Carry`] for the
//! next chunk.
//!
//! Line-prefix quotes (symbolic dialects) are tracked as a line mode, apart
//! from the bracketing span stack. Regular quotes are never reopened; an
//! expandable quote cut across chunks gets its opening prefix back.

mod scan;

pub use scan::{Token, TokenKind};

use tracing::trace;

use crate::dialect::Dialect;
use crate::markers::{MarkerTable, QuoteMode, Span, SpanKind};

/// Tracker state handed from one chunk to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carry {
    /// Open bracketing spans, oldest first.
    pub spans: Vec<Span>,
    pub line_mode: Option<QuoteMode>,
    pub at_line_start: bool,
}

impl Default for Carry {
    fn default() -> Self {
        Self {
            spans: Vec::new(),
            line_mode: None,
            at_line_start: true,
        }
    }
}

impl Carry {
    /// True when nothing is open.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.line_mode.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedChunk {
    pub text: String,
    pub carry: Carry,
}

/// Open-span tracker for one dialect.
#[derive(Debug, Clone)]
pub struct SpanTracker<'t> {
    table: &'t MarkerTable,
    stack: Vec<Span>,
    quote: Option<QuoteMode>,
    at_line_start: bool,
    link_target: bool,
}

impl<'t> SpanTracker<'t> {
    pub fn new(table: &'t MarkerTable) -> Self {
        Self::resume(table, Carry::default())
    }

    pub fn resume(table: &'t MarkerTable, carry: Carry) -> Self {
        Self {
            table,
            stack: carry.spans,
            quote: carry.line_mode,
            at_line_start: carry.at_line_start,
            link_target: false,
        }
    }

    pub fn open_spans(&self) -> &[Span] {
        &self.stack
    }

    pub fn line_mode(&self) -> Option<QuoteMode> {
        self.quote
    }

    pub fn carry(&self) -> Carry {
        Carry {
            spans: self.stack.clone(),
            line_mode: self.quote,
            at_line_start: self.at_line_start,
        }
    }

    /// Returns `raw` with inherited openers prepended and closers appended.
    ///
    /// Closers go before any trailing line breaks so they stay on the last
    /// line of content. The tracker keeps the post-scan state for the next
    /// chunk.
    pub fn balance(&mut self, raw: &str) -> String {
        let dialect = self.table.dialect();
        let mut out = String::with_capacity(raw.len() + 32);
        let (lead, skip) = self.quote_lead(raw).unwrap_or(("", 0));
        out.push_str(lead);
        for span in &self.stack {
            if let Some(opener) = self.table.opener(span) {
                push_joined(&mut out, &opener, dialect);
            }
        }
        let reopened = out.len();

        // A carried link is reopened before its text, never inside its url.
        self.link_target = false;
        self.scan(raw);

        let body_len = raw.trim_end_matches('\n').len();
        push_joined(&mut out, &raw[skip..body_len], dialect);
        let body_end = out.len();
        self.push_closers(&mut out);
        trace!(
            %dialect,
            reopened,
            closed = out.len() - body_end,
            "balanced chunk"
        );
        out.push_str(&raw[body_len..]);
        out
    }

    /// Line prefix written ahead of the reopened spans, with the length of
    /// `raw` it replaces. A carried expandable quote gets its `**>` start
    /// back so the `||` that ends it still parses.
    fn quote_lead(&self, raw: &str) -> Option<(&'static str, usize)> {
        let in_code = self.stack.last().is_some_and(|span| span.kind().is_code());
        if self.quote == Some(QuoteMode::Expandable)
            && let Some((first, rest, _)) = self.table.quote_prefix(QuoteMode::Expandable)
        {
            if !self.at_line_start {
                return Some((first, 0));
            }
            if !in_code && raw.starts_with(rest) && !raw.starts_with(first) {
                return Some((first, rest.len()));
            }
        }
        // Code lines starting with `>` are content, not a quote.
        if in_code || !self.at_line_start {
            return None;
        }
        [QuoteMode::Expandable, QuoteMode::Regular]
            .into_iter()
            .filter_map(|mode| self.table.quote_prefix(mode))
            .map(|(first, ..)| first)
            .find(|first| raw.starts_with(first))
            .map(|first| (first, first.len()))
    }

    /// Closing text for everything still open, innermost first.
    fn push_closers(&self, out: &mut String) {
        let dialect = self.table.dialect();
        let mut in_target = self.link_target;
        for span in self.stack.iter().rev() {
            if in_target && span.kind() == SpanKind::Link {
                out.push(')');
                in_target = false;
            } else if let Some(closer) = self.table.closer(span) {
                push_joined(out, &closer, dialect);
            }
        }
        if self.quote == Some(QuoteMode::Expandable)
            && let Some((_, _, end)) = self.table.quote_prefix(QuoteMode::Expandable)
        {
            out.push_str(end);
        }
    }
}

/// Appends `piece`. In MarkdownV2 a `_` meeting another `_` would read as the
/// underline marker, so the two are separated by `\r`, which Telegram ignores.
fn push_joined(out: &mut String, piece: &str, dialect: Dialect) {
    if dialect == Dialect::MarkdownV2 && out.ends_with('_') && piece.starts_with('_') {
        out.push('\r');
    }
    out.push_str(piece);
}

/// Balances one raw chunk starting from `carry`.
pub fn balance_chunk(raw: &str, table: &MarkerTable, carry: &Carry) -> BalancedChunk {
    let mut tracker = SpanTracker::resume(table, carry.clone());
    let text = tracker.balance(raw);
    BalancedChunk {
        text,
        carry: tracker.carry(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_self_balanced(table: &MarkerTable, text: &str) -> bool {
        let mut tracker = SpanTracker::new(table);
        tracker.scan(text);
        tracker.open_spans().is_empty()
    }

    #[test]
    fn closes_spans_cut_mid_chunk() {
        let chunk = balance_chunk("<b>bold <i>both", &MarkerTable::HTML, &Carry::default());
        assert_eq!(chunk.text, "<b>bold <i>both</i></b>");
        assert_eq!(chunk.carry.spans, vec![Span::Bold, Span::Italic]);
    }

    #[test]
    fn reopens_inherited_spans_oldest_first() {
        let carry = Carry {
            spans: vec![Span::Bold, Span::Italic],
            ..Carry::default()
        };
        let chunk = balance_chunk("rest</i> tail</b>", &MarkerTable::HTML, &carry);
        assert_eq!(chunk.text, "<b><i>rest</i> tail</b>");
        assert!(chunk.carry.is_empty());
    }

    #[test]
    fn html_links_and_code_keep_their_payload() {
        let first = balance_chunk(
            "<a href=\"https://x.y\">long",
            &MarkerTable::HTML,
            &Carry::default(),
        );
        let second = balance_chunk(" label</a>", &MarkerTable::HTML, &first.carry);
        assert_eq!(second.text, "<a href=\"https://x.y\"> label</a>");

        let first = balance_chunk(
            "<pre><code class=\"language-go\">a\n",
            &MarkerTable::HTML,
            &Carry::default(),
        );
        assert_eq!(
            first.text,
            "<pre><code class=\"language-go\">a</code></pre>\n"
        );
        let second = balance_chunk("b</code></pre>", &MarkerTable::HTML, &first.carry);
        assert_eq!(second.text, "<pre><code class=\"language-go\">b</code></pre>");
    }

    #[test]
    fn html_quotes_are_reopened() {
        let first = balance_chunk("<blockquote>a\n", &MarkerTable::HTML, &Carry::default());
        assert_eq!(first.text, "<blockquote>a</blockquote>\n");
        let second = balance_chunk("b</blockquote>", &MarkerTable::HTML, &first.carry);
        assert_eq!(second.text, "<blockquote>b</blockquote>");
    }

    #[test]
    fn symbolic_link_split_in_text_closes_with_empty_target() {
        let first = balance_chunk("see [the", &MarkerTable::MARKDOWN_V2, &Carry::default());
        assert_eq!(first.text, "see [the]()");
        let second = balance_chunk(" docs](u)", &MarkerTable::MARKDOWN_V2, &first.carry);
        assert_eq!(second.text, "[ docs](u)");
        assert!(second.carry.is_empty());
    }

    #[test]
    fn symbolic_code_block_reopens_with_language() {
        let first = balance_chunk("```py\nx = 1\n", &MarkerTable::MARKDOWN_V2, &Carry::default());
        assert_eq!(first.text, "```py\nx = 1```\n");
        let second = balance_chunk("y = 2\n```", &MarkerTable::MARKDOWN_V2, &first.carry);
        assert_eq!(second.text, "```py\ny = 2\n```");
    }

    #[test]
    fn line_prefix_quotes_are_not_reopened() {
        let first = balance_chunk(">a\n", &MarkerTable::MARKDOWN_V2, &Carry::default());
        assert_eq!(first.text, ">a\n");
        assert_eq!(first.carry.line_mode, Some(QuoteMode::Regular));
        let second = balance_chunk(">b", &MarkerTable::MARKDOWN_V2, &first.carry);
        assert_eq!(second.text, ">b");
    }

    #[test]
    fn chunk_ending_on_spoiler_opener_keeps_it_open() {
        let first = balance_chunk("aaaa ||", &MarkerTable::MARKDOWN_V2, &Carry::default());
        assert_eq!(first.text, "aaaa ||||");
        assert_eq!(first.carry.spans, vec![Span::Spoiler]);
        assert!(is_self_balanced(&MarkerTable::MARKDOWN_V2, &first.text));
    }

    #[test]
    fn spoiler_cut_across_chunks_is_reopened_and_closed() {
        let mut tracker = SpanTracker::new(&MarkerTable::MARKDOWN_V2);
        let balanced: Vec<String> = ["aaaa ||", "bbbbbbb", "bbbbbbb", "bb||"]
            .into_iter()
            .map(|raw| tracker.balance(raw))
            .collect();
        assert_eq!(
            balanced,
            vec!["aaaa ||||", "||bbbbbbb||", "||bbbbbbb||", "||bb||"]
        );
        assert!(tracker.carry().is_empty());
        for text in &balanced {
            assert!(is_self_balanced(&MarkerTable::MARKDOWN_V2, text), "{text:?}");
        }
    }

    #[test]
    fn expandable_quote_continuation_gets_its_prefix_back() {
        let first = balance_chunk("**>a\n", &MarkerTable::MARKDOWN_V2, &Carry::default());
        assert_eq!(first.text, "**>a||\n");
        assert_eq!(first.carry.line_mode, Some(QuoteMode::Expandable));
        let second = balance_chunk(">b||\n", &MarkerTable::MARKDOWN_V2, &first.carry);
        assert_eq!(second.text, "**>b||\n");
        assert!(second.carry.is_empty());

        let first = balance_chunk("**>ab", &MarkerTable::MARKDOWN_V2, &Carry::default());
        assert_eq!(first.text, "**>ab||");
        let second = balance_chunk("cd||", &MarkerTable::MARKDOWN_V2, &first.carry);
        assert_eq!(second.text, "**>cd||");
        assert!(second.carry.is_empty());
    }

    #[test]
    fn open_expandable_quote_gets_terminator_before_trailing_newlines() {
        let chunk = balance_chunk("**>a *b\n>c\n", &MarkerTable::MARKDOWN_V2, &Carry::default());
        assert_eq!(chunk.text, "**>a *b\n>c*||\n");
        assert!(is_self_balanced(&MarkerTable::MARKDOWN_V2, &chunk.text));
    }

    #[test]
    fn balanced_chunks_rescan_clean() {
        let cases: [(&MarkerTable, &str); 4] = [
            (&MarkerTable::HTML, "<b>x <tg-spoiler>y"),
            (&MarkerTable::MARKDOWN_V2, "*x ~y ||z"),
            (&MarkerTable::MARKDOWN_V2, "`code"),
            (&MarkerTable::MARKDOWN, "_it [li"),
        ];
        for (table, raw) in cases {
            let chunk = balance_chunk(raw, table, &Carry::default());
            assert!(is_self_balanced(table, &chunk.text), "{:?}", chunk.text);
        }
    }

    #[test]
    fn separates_italic_markers_that_would_merge() {
        let chunk = balance_chunk("a _", &MarkerTable::MARKDOWN_V2, &Carry::default());
        assert_eq!(chunk.text, "a _\r_");
        assert!(is_self_balanced(&MarkerTable::MARKDOWN_V2, &chunk.text));
    }

    #[test]
    fn carry_is_the_state_before_synthetic_closers() {
        let mut tracker = SpanTracker::new(&MarkerTable::MARKDOWN_V2);
        let text = tracker.balance("*a _b");
        assert_eq!(text, "*a _b_*");
        assert_eq!(tracker.carry().spans, vec![Span::Bold, Span::Italic]);
    }
}
