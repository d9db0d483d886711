use pulldown_cmark::{html, Event, Options, Parser};

/// Turns accumulated Markdown-ish text into display markup
///
/// Called after every fragment with the whole accumulated text, so implementations must be pure
/// and must cope with syntactically incomplete input. Errors are not fatal: the caller falls back
/// to the escaped raw text.
pub trait MessageRenderer: Send + Sync {
    fn render(&self, text: &str) -> anyhow::Result<String>;
}

impl<F> MessageRenderer for F
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync,
{
    fn render(&self, text: &str) -> anyhow::Result<String> {
        self(text)
    }
}

/// CommonMark renderer with tables and strikethrough
///
/// Raw HTML in the text is escaped rather than passed through. Unclosed constructs such as an
/// open code fence render as whatever pulldown-cmark makes of them so far.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MessageRenderer for MarkdownRenderer {
    fn render(&self, text: &str) -> anyhow::Result<String> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let parser = Parser::new_ext(text, options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out.trim_end().to_string())
    }
}

/// Fallback when a renderer fails
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
