use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target markup grammar for an outgoing message.
///
/// Variants are declared richest first; that order is the fallback order
/// used when a transport refuses a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Tag-based grammar (Telegram `HTML`).
    Html,
    /// Strict backslash-escaped symbolic grammar (Telegram `MarkdownV2`).
    #[serde(rename = "markdown-v2")]
    MarkdownV2,
    /// Legacy symbolic grammar (Telegram `Markdown`).
    Markdown,
    /// No markup at all.
    Plain,
}

impl Dialect {
    pub const FALLBACK_ORDER: [Dialect; 4] = [
        Dialect::Html,
        Dialect::MarkdownV2,
        Dialect::Markdown,
        Dialect::Plain,
    ];

    /// Telegram `parse_mode` value, `None` for plain text.
    pub fn parse_mode(self) -> Option<&'static str> {
        match self {
            Dialect::Html => Some("HTML"),
            Dialect::MarkdownV2 => Some("MarkdownV2"),
            Dialect::Markdown => Some("Markdown"),
            Dialect::Plain => None,
        }
    }

    /// Next dialect in the fallback order.
    pub fn weaker(self) -> Option<Dialect> {
        match self {
            Dialect::Html => Some(Dialect::MarkdownV2),
            Dialect::MarkdownV2 => Some(Dialect::Markdown),
            Dialect::Markdown => Some(Dialect::Plain),
            Dialect::Plain => None,
        }
    }

    pub fn is_symbolic(self) -> bool {
        matches!(self, Dialect::MarkdownV2 | Dialect::Markdown)
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Html => "html",
            Dialect::MarkdownV2 => "markdown-v2",
            Dialect::Markdown => "markdown",
            Dialect::Plain => "plain",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(Dialect::Html),
            "markdown-v2" | "markdownv2" | "mdv2" => Ok(Dialect::MarkdownV2),
            "markdown" | "legacy" => Ok(Dialect::Markdown),
            "plain" | "text" => Ok(Dialect::Plain),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}
