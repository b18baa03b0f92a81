//! Inline constructs within a single source line.

use super::Emitter;
use super::escape::{self, Context};
use crate::markers::Span;

/// A recognized inline construct. Offsets are relative to the scanned text.
#[derive(Debug, PartialEq, Eq)]
enum Construct<'s> {
    Code {
        content: &'s str,
        content_at: usize,
        end: usize,
    },
    Link {
        label: &'s str,
        url: &'s str,
        end: usize,
    },
    Emphasis {
        span: Span,
        content: &'s str,
        content_at: usize,
        end: usize,
    },
    /// A marker with no partner, kept as literal text up to `end`.
    Literal { end: usize },
}

/// Emits `text` (which starts at source offset `at`) with inline formatting.
pub(super) fn emit(em: &mut Emitter<'_>, text: &str, at: usize) {
    let mut pos = 0;
    let mut plain_from = 0;

    while pos < text.len() {
        let Some(construct) = construct_at(text, pos) else {
            if matches!(text.as_bytes()[pos], b'*' | b'`') {
                em.degraded += 1;
            }
            pos += char_len_at(text, pos);
            continue;
        };

        if let Construct::Literal { end } = construct {
            em.degraded += 1;
            pos = end;
            continue;
        }

        em.literal(&text[plain_from..pos], at + plain_from, Context::Text);
        pos = match construct {
            Construct::Code {
                content,
                content_at,
                end,
            } => {
                let opened = em.open(&Span::InlineCode);
                let context = if opened { Context::Code } else { Context::Text };
                em.literal(content, at + content_at, context);
                em.close(&Span::InlineCode, opened, at + end);
                end
            }
            Construct::Link { label, url, end } => {
                let span = Span::Link {
                    url: Some(escape::escape(url, em.dialect(), Context::Url)),
                };
                let opened = em.open(&span);
                em.literal_unmapped(label, Context::Text);
                if !opened {
                    em.literal_unmapped(" (", Context::Text);
                    em.literal_unmapped(url, Context::Text);
                    em.literal_unmapped(")", Context::Text);
                }
                em.close(&span, opened, at + end);
                end
            }
            Construct::Emphasis {
                span,
                content,
                content_at,
                end,
            } => {
                let opened = em.open(&span);
                emit(em, content, at + content_at);
                em.close(&span, opened, at + end);
                end
            }
            Construct::Literal { end } => end,
        };
        plain_from = pos;
    }

    em.literal(&text[plain_from..], at + plain_from, Context::Text);
}

fn construct_at(text: &str, pos: usize) -> Option<Construct<'_>> {
    let rest = &text[pos..];
    match rest.as_bytes()[0] {
        b'`' => inline_code(text, pos),
        b'[' => link(text, pos),
        b'*' if rest.starts_with("**") => double(text, pos, "**", Span::Bold),
        b'_' if rest.starts_with("__") => double(text, pos, "__", Span::Bold),
        b'~' if rest.starts_with("~~") => double(text, pos, "~~", Span::Strikethrough),
        b'|' if rest.starts_with("||") => double(text, pos, "||", Span::Spoiler),
        b'*' => single_star(text, pos),
        b'_' => single_underscore(text, pos),
        _ => None,
    }
}

fn inline_code(text: &str, pos: usize) -> Option<Construct<'_>> {
    let content_at = pos + 1;
    let close = text[content_at..].find('`')?;
    if close == 0 {
        return None;
    }
    Some(Construct::Code {
        content: &text[content_at..content_at + close],
        content_at,
        end: content_at + close + 1,
    })
}

fn link(text: &str, pos: usize) -> Option<Construct<'_>> {
    let label_at = pos + 1;
    let middle = find_outside_code(text, label_at, "](")?;
    if middle == label_at {
        return None;
    }
    let url_at = middle + 2;
    let close = text[url_at..].find(')')?;
    if close == 0 {
        return None;
    }
    Some(Construct::Link {
        label: &text[label_at..middle],
        url: &text[url_at..url_at + close],
        end: url_at + close + 1,
    })
}

/// Two-character delimiters. An unpaired delimiter is consumed whole as
/// literal text so its second character cannot pair on its own.
fn double<'s>(text: &'s str, pos: usize, delim: &str, span: Span) -> Option<Construct<'s>> {
    let content_at = pos + delim.len();
    match find_outside_code(text, content_at, delim) {
        Some(close) if close > content_at => Some(Construct::Emphasis {
            span,
            content: &text[content_at..close],
            content_at,
            end: close + delim.len(),
        }),
        _ => Some(Construct::Literal { end: content_at }),
    }
}

fn single_star(text: &str, pos: usize) -> Option<Construct<'_>> {
    let content_at = pos + 1;
    let next = text[content_at..].chars().next()?;
    if next.is_whitespace() {
        return None;
    }

    let bytes = text.as_bytes();
    let mut from = content_at;
    while let Some(close) = find_outside_code(text, from, "*") {
        let adjacent = bytes.get(close + 1) == Some(&b'*') || bytes[close - 1] == b'*';
        let before = char_before(text, close);
        if close > content_at && !adjacent && before.is_some_and(|c| !c.is_whitespace()) {
            return Some(Construct::Emphasis {
                span: Span::Italic,
                content: &text[content_at..close],
                content_at,
                end: close + 1,
            });
        }
        from = close + 1;
    }
    None
}

fn single_underscore(text: &str, pos: usize) -> Option<Construct<'_>> {
    if char_before(text, pos).is_some_and(is_word_char) {
        return None;
    }
    let content_at = pos + 1;
    let next = text[content_at..].chars().next()?;
    if next.is_whitespace() || next == '_' {
        return None;
    }

    let bytes = text.as_bytes();
    let mut from = content_at;
    while let Some(close) = find_outside_code(text, from, "_") {
        let adjacent = bytes.get(close + 1) == Some(&b'_') || bytes[close - 1] == b'_';
        let before = char_before(text, close);
        let after = text[close + 1..].chars().next();
        if close > content_at
            && !adjacent
            && before.is_some_and(|c| !c.is_whitespace())
            && !after.is_some_and(is_word_char)
        {
            return Some(Construct::Emphasis {
                span: Span::Italic,
                content: &text[content_at..close],
                content_at,
                end: close + 1,
            });
        }
        from = close + 1;
    }
    None
}

/// Finds `needle` at or after `from`, skipping over backtick code spans.
fn find_outside_code(text: &str, from: usize, needle: &str) -> Option<usize> {
    let mut pos = from;
    while pos < text.len() {
        let rest = &text[pos..];
        if rest.starts_with(needle) {
            return Some(pos);
        }
        if rest.starts_with('`')
            && let Some(close) = rest[1..].find('`')
            && close > 0
        {
            pos += close + 2;
            continue;
        }
        pos += char_len_at(text, pos);
    }
    None
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric()
}

fn char_before(text: &str, pos: usize) -> Option<char> {
    text[..pos].chars().next_back()
}

fn char_len_at(text: &str, pos: usize) -> usize {
    text[pos..].chars().next().map_or(1, char::len_utf8)
}
