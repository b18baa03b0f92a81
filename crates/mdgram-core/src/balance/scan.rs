//! Marker tokenizer for rendered text.
//!
//! Tokenizing is stateful: whether `` ` `` opens or closes, whether `)` ends
//! a link, and whether a line prefix continues a quote all depend on what is
//! open. The scan therefore runs on a [`SpanTracker`] and updates it as it
//! goes.

use std::ops::Range;

use tracing::warn;

use super::SpanTracker;
use crate::dialect::Dialect;
use crate::markers::{Marker, QuoteMode, Span, SpanKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub range: Range<usize>,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    /// Backslash escape in the symbolic dialects.
    Escape,
    /// `&name;` character reference in HTML.
    Entity,
    Newline,
    Open(SpanKind),
    Close(SpanKind),
    /// The `](` between link text and url.
    LinkTarget,
    LinePrefix(QuoteMode),
    /// Terminator of an expandable line-prefix quote.
    QuoteEnd,
}

const SYMBOLIC_STOPS: &[u8] = b"\\\n[])|`*_~";
const SYMBOLIC_CODE_STOPS: &[u8] = b"\\`\n";
const HTML_STOPS: &[u8] = b"<&\n";

impl SpanTracker<'_> {
    /// Tokenizes `text`, applying every open and close to the tracker state.
    pub fn scan(&mut self, text: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            let rest = &text[pos..];
            let (len, kind) = match self.table.dialect() {
                Dialect::Html => self.html_token(rest),
                Dialect::MarkdownV2 | Dialect::Markdown => self.symbolic_token(rest),
                Dialect::Plain => (rest.len(), TokenKind::Text),
            };
            let range = pos..pos + len;
            match tokens.last_mut() {
                Some(last) if kind == TokenKind::Text && last.kind == TokenKind::Text => {
                    last.range.end = range.end;
                }
                _ => tokens.push(Token { range, kind }),
            }
            pos += len;
        }
        tokens
    }

    fn top(&self) -> Option<SpanKind> {
        self.stack.last().map(Span::kind)
    }

    fn open(&mut self, span: Span) -> TokenKind {
        let kind = span.kind();
        self.stack.push(span);
        TokenKind::Open(kind)
    }

    /// Closes the most recent span of `kind`'s family. Spans opened after it
    /// stay open.
    fn close(&mut self, kind: SpanKind) -> TokenKind {
        let same = |open: SpanKind| open == kind || (open.is_quote() && kind.is_quote());
        match self.stack.iter().rposition(|span| same(span.kind())) {
            Some(idx) => TokenKind::Close(self.stack.remove(idx).kind()),
            None => {
                warn!(dialect = %self.table.dialect(), ?kind, "unmatched closing marker");
                TokenKind::Text
            }
        }
    }

    fn html_token(&mut self, rest: &str) -> (usize, TokenKind) {
        if let Some(code) = self.top().filter(|kind| kind.is_code()) {
            let closers: &[&str] = match code {
                SpanKind::CodeBlock => &["</code></pre>", "</pre>"],
                _ => &["</code>"],
            };
            if let Some(closer) = closers.iter().find(|closer| starts_with_ignore_case(rest, closer)) {
                return (closer.len(), self.close(code));
            }
            if rest.starts_with('&') {
                return entity(rest);
            }
            return (text_run(rest, b"<&"), TokenKind::Text);
        }

        match rest.as_bytes()[0] {
            b'<' => self
                .html_tag(rest)
                .unwrap_or((1, TokenKind::Text)),
            b'&' => entity(rest),
            b'\n' => (1, TokenKind::Newline),
            _ => (text_run(rest, HTML_STOPS), TokenKind::Text),
        }
    }

    fn html_tag(&mut self, rest: &str) -> Option<(usize, TokenKind)> {
        let end = rest.find('>')?;
        let inner = &rest[1..end];

        if let Some(name) = inner.strip_prefix('/') {
            let kind = html_close_kind(&name.trim().to_ascii_lowercase())?;
            return Some((end + 1, self.close(kind)));
        }

        let (name, attrs) = inner
            .split_once(char::is_whitespace)
            .unwrap_or((inner, ""));
        let span = match name.to_ascii_lowercase().as_str() {
            "b" | "strong" => Span::Bold,
            "i" | "em" => Span::Italic,
            "u" | "ins" => Span::Underline,
            "s" | "strike" | "del" => Span::Strikethrough,
            "tg-spoiler" => Span::Spoiler,
            "span" if attr_value(attrs, "class").as_deref() == Some("tg-spoiler") => Span::Spoiler,
            "code" => Span::InlineCode,
            "a" => Span::Link {
                url: attr_value(attrs, "href"),
            },
            "blockquote" if attrs.contains("expandable") => Span::BlockQuoteExpandable,
            "blockquote" => Span::BlockQuote,
            "pre" => {
                let after = &rest[end + 1..];
                if starts_with_ignore_case(after, "<code")
                    && let Some(code_end) = after.find('>')
                {
                    let lang = attr_value(&after[5..code_end], "class")
                        .and_then(|class| class.strip_prefix("language-").map(str::to_string));
                    let len = end + 1 + code_end + 1;
                    return Some((len, self.open(Span::CodeBlock { lang })));
                }
                Span::CodeBlock { lang: None }
            }
            _ => return None,
        };
        Some((end + 1, self.open(span)))
    }

    fn symbolic_token(&mut self, rest: &str) -> (usize, TokenKind) {
        let top = self.top();
        if let Some(code) = top.filter(|kind| kind.is_code()) {
            return self.code_token(rest, code);
        }

        if self.at_line_start {
            self.at_line_start = false;
            if let Some(prefix) = self.line_prefix(rest) {
                return prefix;
            }
        }

        match rest.as_bytes()[0] {
            b'\\' if rest.len() > 1 => return (1 + char_len(&rest[1..]), TokenKind::Escape),
            b'\n' => {
                self.at_line_start = true;
                return (1, TokenKind::Newline);
            }
            _ if self.link_target => return self.link_target_token(rest, top),
            b'[' if self.table.supports(SpanKind::Link) => {
                return (1, self.open(Span::Link { url: None }));
            }
            b']' if rest.starts_with("](") && top == Some(SpanKind::Link) => {
                self.link_target = true;
                return (2, TokenKind::LinkTarget);
            }
            b'|' if rest.starts_with("||")
                && top != Some(SpanKind::Spoiler)
                && self.quote == Some(QuoteMode::Expandable)
                && at_line_end(&rest[2..]) =>
            {
                self.quote = None;
                return (2, TokenKind::QuoteEnd);
            }
            b'`' if rest.starts_with("```") && self.table.supports(SpanKind::CodeBlock) => {
                return self.open_code_block(rest);
            }
            _ => {}
        }

        if let Some(toggle) = self.toggle(rest, top) {
            return toggle;
        }
        (text_run(rest, SYMBOLIC_STOPS), TokenKind::Text)
    }

    /// Inside a link url only `)` means anything.
    fn link_target_token(&mut self, rest: &str, top: Option<SpanKind>) -> (usize, TokenKind) {
        if rest.starts_with(')') && top == Some(SpanKind::Link) {
            self.link_target = false;
            return (1, self.close(SpanKind::Link));
        }
        (text_run(rest, b"\\\n)"), TokenKind::Text)
    }

    fn code_token(&mut self, rest: &str, code: SpanKind) -> (usize, TokenKind) {
        if rest.starts_with('\\') && rest.len() > 1 {
            return (1 + char_len(&rest[1..]), TokenKind::Escape);
        }
        let closer = if code == SpanKind::CodeBlock { "```" } else { "`" };
        if rest.starts_with(closer) {
            return (closer.len(), self.close(code));
        }
        if rest.starts_with('\n') {
            return (1, TokenKind::Newline);
        }
        (text_run(rest, SYMBOLIC_CODE_STOPS), TokenKind::Text)
    }

    fn open_code_block(&mut self, rest: &str) -> (usize, TokenKind) {
        let after = &rest[3..];
        let lang_len = after.bytes().take_while(|b| is_lang_byte(*b)).count();
        if after.as_bytes().get(lang_len) == Some(&b'\n') {
            let lang = (lang_len > 0).then(|| after[..lang_len].to_string());
            (3 + lang_len + 1, self.open(Span::CodeBlock { lang }))
        } else {
            (3, self.open(Span::CodeBlock { lang: None }))
        }
    }

    /// Handles the start of a line in dialects with line-prefix quotes.
    fn line_prefix(&mut self, rest: &str) -> Option<(usize, TokenKind)> {
        let continuing = self
            .quote
            .and_then(|mode| self.table.quote_prefix(mode).map(|(_, cont, _)| (mode, cont)));
        let candidates = [
            self.table
                .quote_prefix(QuoteMode::Expandable)
                .map(|(first, ..)| (QuoteMode::Expandable, first)),
            continuing,
            self.table
                .quote_prefix(QuoteMode::Regular)
                .map(|(first, ..)| (QuoteMode::Regular, first)),
        ];
        for (mode, prefix) in candidates.into_iter().flatten() {
            if rest.starts_with(prefix) {
                self.quote = Some(mode);
                return Some((prefix.len(), TokenKind::LinePrefix(mode)));
            }
        }
        self.quote = None;
        None
    }

    /// Symmetric markers. Closing the innermost span wins over opening a
    /// longer marker that shares its prefix.
    fn toggle(&mut self, rest: &str, top: Option<SpanKind>) -> Option<(usize, TokenKind)> {
        if let Some(kind) = top
            && let Some(marker) = self.toggle_marker(kind)
            && rest.starts_with(marker)
        {
            return Some((marker.len(), self.close(kind)));
        }

        let (marker, kind) = SpanKind::ALL
            .into_iter()
            .filter_map(|kind| self.toggle_marker(kind).map(|marker| (marker, kind)))
            .filter(|(marker, _)| rest.starts_with(marker))
            .max_by_key(|(marker, _)| marker.len())?;

        let kind = if self.stack.iter().any(|span| span.kind() == kind) {
            self.close(kind)
        } else {
            self.open(Span::bare(kind))
        };
        Some((marker.len(), kind))
    }

    fn toggle_marker(&self, kind: SpanKind) -> Option<&'static str> {
        if kind == SpanKind::CodeBlock || kind.is_quote() {
            return None;
        }
        match *self.table.marker(kind) {
            Marker::Paired { open, close } if open == close => Some(open),
            _ => None,
        }
    }
}

fn html_close_kind(name: &str) -> Option<SpanKind> {
    let kind = match name {
        "b" | "strong" => SpanKind::Bold,
        "i" | "em" => SpanKind::Italic,
        "u" | "ins" => SpanKind::Underline,
        "s" | "strike" | "del" => SpanKind::Strikethrough,
        "tg-spoiler" | "span" => SpanKind::Spoiler,
        "code" => SpanKind::InlineCode,
        "pre" => SpanKind::CodeBlock,
        "a" => SpanKind::Link,
        "blockquote" => SpanKind::BlockQuote,
        _ => return None,
    };
    Some(kind)
}

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    let key = format!("{name}=\"");
    let start = attrs.find(&key)? + key.len();
    let len = attrs[start..].find('"')?;
    Some(attrs[start..start + len].to_string())
}

fn entity(rest: &str) -> (usize, TokenKind) {
    let name_len = rest[1..]
        .bytes()
        .take(10)
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'#')
        .count();
    if name_len > 0 && rest.as_bytes().get(1 + name_len) == Some(&b';') {
        (name_len + 2, TokenKind::Entity)
    } else {
        (1, TokenKind::Text)
    }
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn at_line_end(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with('\n')
}

fn is_lang_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'+' | b'-')
}

fn char_len(text: &str) -> usize {
    text.chars().next().map_or(0, char::len_utf8)
}

/// Length of the text run at the start of `rest`: at least one character,
/// then up to the next stop byte.
fn text_run(rest: &str, stops: &[u8]) -> usize {
    let first = char_len(rest).max(1);
    first
        + rest[first..]
            .bytes()
            .position(|b| stops.contains(&b))
            .unwrap_or(rest.len() - first)
}
