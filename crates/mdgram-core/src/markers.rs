//! Per-dialect marker tables.
//!
//! A [`MarkerTable`] is plain data describing how each [`SpanKind`] is spelled
//! in one dialect. The renderer, splitter and tracker all take the table as an
//! argument; nothing looks markers up through shared state.

use std::borrow::Cow;

use crate::dialect::Dialect;

/// Formatting region kinds, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    InlineCode,
    CodeBlock,
    Link,
    BlockQuote,
    BlockQuoteExpandable,
}

impl SpanKind {
    pub const ALL: [SpanKind; 10] = [
        SpanKind::Bold,
        SpanKind::Italic,
        SpanKind::Underline,
        SpanKind::Strikethrough,
        SpanKind::Spoiler,
        SpanKind::InlineCode,
        SpanKind::CodeBlock,
        SpanKind::Link,
        SpanKind::BlockQuote,
        SpanKind::BlockQuoteExpandable,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Code spans switch the tokenizer into literal mode.
    pub fn is_code(self) -> bool {
        matches!(self, SpanKind::InlineCode | SpanKind::CodeBlock)
    }

    pub fn is_quote(self) -> bool {
        matches!(self, SpanKind::BlockQuote | SpanKind::BlockQuoteExpandable)
    }
}

/// A formatting region, with the payload some kinds carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    InlineCode,
    CodeBlock { lang: Option<String> },
    Link { url: Option<String> },
    BlockQuote,
    BlockQuoteExpandable,
}

impl Span {
    pub fn kind(&self) -> SpanKind {
        match self {
            Span::Bold => SpanKind::Bold,
            Span::Italic => SpanKind::Italic,
            Span::Underline => SpanKind::Underline,
            Span::Strikethrough => SpanKind::Strikethrough,
            Span::Spoiler => SpanKind::Spoiler,
            Span::InlineCode => SpanKind::InlineCode,
            Span::CodeBlock { .. } => SpanKind::CodeBlock,
            Span::Link { .. } => SpanKind::Link,
            Span::BlockQuote => SpanKind::BlockQuote,
            Span::BlockQuoteExpandable => SpanKind::BlockQuoteExpandable,
        }
    }

    /// Url of a link or language of a code block, when known.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Span::CodeBlock { lang } => lang.as_deref(),
            Span::Link { url } => url.as_deref(),
            _ => None,
        }
    }

    /// Span of the given kind with no payload.
    pub fn bare(kind: SpanKind) -> Span {
        match kind {
            SpanKind::Bold => Span::Bold,
            SpanKind::Italic => Span::Italic,
            SpanKind::Underline => Span::Underline,
            SpanKind::Strikethrough => Span::Strikethrough,
            SpanKind::Spoiler => Span::Spoiler,
            SpanKind::InlineCode => Span::InlineCode,
            SpanKind::CodeBlock => Span::CodeBlock { lang: None },
            SpanKind::Link => Span::Link { url: None },
            SpanKind::BlockQuote => Span::BlockQuote,
            SpanKind::BlockQuoteExpandable => Span::BlockQuoteExpandable,
        }
    }
}

/// Line-prefix quote state, tracked apart from the bracketing span stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    Regular,
    Expandable,
}

impl QuoteMode {
    pub fn kind(self) -> SpanKind {
        match self {
            QuoteMode::Regular => SpanKind::BlockQuote,
            QuoteMode::Expandable => SpanKind::BlockQuoteExpandable,
        }
    }
}

/// How one span kind is spelled in a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// The dialect has no syntax for this kind.
    Unsupported,
    Paired {
        open: &'static str,
        close: &'static str,
    },
    /// Markers with a `{}` slot for a url or language. The `bare_*` forms are
    /// used when the payload is unknown.
    Payload {
        open: &'static str,
        bare_open: &'static str,
        close: &'static str,
        bare_close: &'static str,
    },
    /// Per-line prefix. `first` starts the run, `rest` continues it and `end`
    /// is appended to the last line.
    LinePrefix {
        first: &'static str,
        rest: &'static str,
        end: &'static str,
    },
}

impl Marker {
    /// Opening text for a bracketing marker; `None` for line prefixes and
    /// unsupported kinds.
    pub fn open(&self, payload: Option<&str>) -> Option<Cow<'static, str>> {
        match *self {
            Marker::Paired { open, .. } => Some(Cow::Borrowed(open)),
            Marker::Payload {
                open, bare_open, ..
            } => Some(fill_slot(open, bare_open, payload)),
            Marker::Unsupported | Marker::LinePrefix { .. } => None,
        }
    }

    /// Closing text for a bracketing marker.
    pub fn close(&self, payload: Option<&str>) -> Option<Cow<'static, str>> {
        match *self {
            Marker::Paired { close, .. } => Some(Cow::Borrowed(close)),
            Marker::Payload {
                close, bare_close, ..
            } => Some(fill_slot(close, bare_close, payload)),
            Marker::Unsupported | Marker::LinePrefix { .. } => None,
        }
    }

    pub fn is_bracketing(&self) -> bool {
        matches!(self, Marker::Paired { .. } | Marker::Payload { .. })
    }
}

fn fill_slot(template: &'static str, bare: &'static str, payload: Option<&str>) -> Cow<'static, str> {
    match payload {
        Some(value) if !value.is_empty() => Cow::Owned(template.replacen("{}", value, 1)),
        _ => Cow::Borrowed(bare),
    }
}

/// Marker spelling for every span kind in one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerTable {
    dialect: Dialect,
    markers: [Marker; 10],
    nesting: bool,
}

const NONE: Marker = Marker::Unsupported;

impl MarkerTable {
    pub const HTML: MarkerTable = MarkerTable {
        dialect: Dialect::Html,
        markers: [
            Marker::Paired {
                open: "<b>",
                close: "</b>",
            },
            Marker::Paired {
                open: "<i>",
                close: "</i>",
            },
            Marker::Paired {
                open: "<u>",
                close: "</u>",
            },
            Marker::Paired {
                open: "<s>",
                close: "</s>",
            },
            Marker::Paired {
                open: "<tg-spoiler>",
                close: "</tg-spoiler>",
            },
            Marker::Paired {
                open: "<code>",
                close: "</code>",
            },
            Marker::Payload {
                open: "<pre><code class=\"language-{}\">",
                bare_open: "<pre>",
                close: "</code></pre>",
                bare_close: "</pre>",
            },
            Marker::Payload {
                open: "<a href=\"{}\">",
                bare_open: "<a>",
                close: "</a>",
                bare_close: "</a>",
            },
            Marker::Paired {
                open: "<blockquote>",
                close: "</blockquote>",
            },
            Marker::Paired {
                open: "<blockquote expandable>",
                close: "</blockquote>",
            },
        ],
        nesting: true,
    };

    pub const MARKDOWN_V2: MarkerTable = MarkerTable {
        dialect: Dialect::MarkdownV2,
        markers: [
            Marker::Paired {
                open: "*",
                close: "*",
            },
            Marker::Paired {
                open: "_",
                close: "_",
            },
            Marker::Paired {
                open: "__",
                close: "__",
            },
            Marker::Paired {
                open: "~",
                close: "~",
            },
            Marker::Paired {
                open: "||",
                close: "||",
            },
            Marker::Paired {
                open: "`",
                close: "`",
            },
            Marker::Payload {
                open: "```{}\n",
                bare_open: "```\n",
                close: "```",
                bare_close: "```",
            },
            Marker::Payload {
                open: "[",
                bare_open: "[",
                close: "]({})",
                bare_close: "]()",
            },
            Marker::LinePrefix {
                first: ">",
                rest: ">",
                end: "",
            },
            Marker::LinePrefix {
                first: "**>",
                rest: ">",
                end: "||",
            },
        ],
        nesting: true,
    };

    pub const MARKDOWN: MarkerTable = MarkerTable {
        dialect: Dialect::Markdown,
        markers: [
            Marker::Paired {
                open: "*",
                close: "*",
            },
            Marker::Paired {
                open: "_",
                close: "_",
            },
            NONE,
            NONE,
            NONE,
            Marker::Paired {
                open: "`",
                close: "`",
            },
            Marker::Paired {
                open: "```\n",
                close: "```",
            },
            Marker::Payload {
                open: "[",
                bare_open: "[",
                close: "]({})",
                bare_close: "]()",
            },
            NONE,
            NONE,
        ],
        nesting: false,
    };

    pub const PLAIN: MarkerTable = MarkerTable {
        dialect: Dialect::Plain,
        markers: [NONE; 10],
        nesting: false,
    };

    pub fn for_dialect(dialect: Dialect) -> &'static MarkerTable {
        match dialect {
            Dialect::Html => &Self::HTML,
            Dialect::MarkdownV2 => &Self::MARKDOWN_V2,
            Dialect::Markdown => &Self::MARKDOWN,
            Dialect::Plain => &Self::PLAIN,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn marker(&self, kind: SpanKind) -> &Marker {
        &self.markers[kind.index()]
    }

    pub fn supports(&self, kind: SpanKind) -> bool {
        !matches!(self.marker(kind), Marker::Unsupported)
    }

    /// Whether spans may be nested inside other spans.
    pub fn allows_nesting(&self) -> bool {
        self.nesting
    }

    pub fn opener(&self, span: &Span) -> Option<Cow<'static, str>> {
        self.marker(span.kind()).open(span.payload())
    }

    pub fn closer(&self, span: &Span) -> Option<Cow<'static, str>> {
        self.marker(span.kind()).close(span.payload())
    }

    /// Line prefix strings for a quote mode, if the dialect spells quotes that way.
    pub fn quote_prefix(&self, mode: QuoteMode) -> Option<(&'static str, &'static str, &'static str)> {
        match *self.marker(mode.kind()) {
            Marker::LinePrefix { first, rest, end } => Some((first, rest, end)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_slot_is_filled_when_known() {
        let table = MarkerTable::for_dialect(Dialect::Html);
        let link = Span::Link {
            url: Some("https://example.com".to_string()),
        };
        assert_eq!(
            table.opener(&link).as_deref(),
            Some("<a href=\"https://example.com\">")
        );

        let code = Span::CodeBlock {
            lang: Some("rust".to_string()),
        };
        assert_eq!(
            table.opener(&code).as_deref(),
            Some("<pre><code class=\"language-rust\">")
        );
        assert_eq!(table.closer(&code).as_deref(), Some("</code></pre>"));
    }

    #[test]
    fn bare_forms_are_used_without_payload() {
        let table = MarkerTable::for_dialect(Dialect::MarkdownV2);
        let link = Span::Link { url: None };
        assert_eq!(table.opener(&link).as_deref(), Some("["));
        assert_eq!(table.closer(&link).as_deref(), Some("]()"));

        let html = MarkerTable::for_dialect(Dialect::Html);
        let code = Span::CodeBlock { lang: None };
        assert_eq!(html.opener(&code).as_deref(), Some("<pre>"));
        assert_eq!(html.closer(&code).as_deref(), Some("</pre>"));
    }

    #[test]
    fn line_prefix_quotes_have_no_bracketing_markers() {
        let table = MarkerTable::for_dialect(Dialect::MarkdownV2);
        assert_eq!(table.opener(&Span::BlockQuote), None);
        assert_eq!(table.closer(&Span::BlockQuoteExpandable), None);
        assert_eq!(
            table.quote_prefix(QuoteMode::Expandable),
            Some(("**>", ">", "||"))
        );
    }

    #[test]
    fn html_quotes_are_bracketing() {
        let table = MarkerTable::for_dialect(Dialect::Html);
        assert!(table.marker(SpanKind::BlockQuote).is_bracketing());
        assert_eq!(table.quote_prefix(QuoteMode::Regular), None);
    }

    #[test]
    fn legacy_lacks_underline_strike_spoiler_and_quotes() {
        let table = MarkerTable::for_dialect(Dialect::Markdown);
        for kind in [
            SpanKind::Underline,
            SpanKind::Strikethrough,
            SpanKind::Spoiler,
            SpanKind::BlockQuote,
            SpanKind::BlockQuoteExpandable,
        ] {
            assert!(!table.supports(kind), "{kind:?}");
        }
        assert!(!table.allows_nesting());
    }

    #[test]
    fn plain_supports_nothing() {
        let table = MarkerTable::for_dialect(Dialect::Plain);
        assert!(SpanKind::ALL.iter().all(|kind| !table.supports(*kind)));
    }

    #[test]
    fn tables_report_their_dialect() {
        for dialect in Dialect::FALLBACK_ORDER {
            assert_eq!(MarkerTable::for_dialect(dialect).dialect(), dialect);
        }
    }
}
