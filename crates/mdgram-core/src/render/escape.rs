use crate::dialect::Dialect;

/// Where a literal character lands in the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Text,
    Code,
    Url,
}

const MARKDOWN_V2_TEXT: &str = "_*[]()~`>#+-=|{}.!\\";
const MARKDOWN_V2_CODE: &str = "`\\";
const MARKDOWN_V2_URL: &str = ")\\";
const MARKDOWN_TEXT: &str = "_*`[\\";
const MARKDOWN_CODE: &str = "`\\";

/// Appends `ch` to `out`, escaped for `dialect` in `context`.
pub fn push_escaped(out: &mut String, dialect: Dialect, context: Context, ch: char) {
    match dialect {
        Dialect::Html => match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if context == Context::Url => out.push_str("&quot;"),
            _ => out.push(ch),
        },
        Dialect::MarkdownV2 => {
            let special = match context {
                Context::Text => MARKDOWN_V2_TEXT,
                Context::Code => MARKDOWN_V2_CODE,
                Context::Url => MARKDOWN_V2_URL,
            };
            if special.contains(ch) {
                out.push('\\');
            }
            out.push(ch);
        }
        Dialect::Markdown => {
            let special = match context {
                Context::Text => MARKDOWN_TEXT,
                Context::Code => MARKDOWN_CODE,
                Context::Url => "",
            };
            if special.contains(ch) {
                out.push('\\');
            }
            out.push(ch);
        }
        Dialect::Plain => out.push(ch),
    }
}

/// Escapes a whole string; see [`push_escaped`].
pub fn escape(text: &str, dialect: Dialect, context: Context) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        push_escaped(&mut out, dialect, context, ch);
    }
    out
}
