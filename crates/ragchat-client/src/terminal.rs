use ragchat_render::{MessageRenderer, RenderUpdate, RenderView};
use std::io::Write;

/// Renders nothing: the terminal shows the raw answer text
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTextRenderer;

impl MessageRenderer for RawTextRenderer {
    fn render(&self, text: &str) -> anyhow::Result<String> {
        Ok(text.to_string())
    }
}

/// Prints a streaming answer as it arrives
///
/// Meant to be paired with [`RawTextRenderer`]: each partial render is the whole answer so far,
/// and only the part not yet printed is written.
pub struct TerminalView<W: Write> {
    out: W,
    printed: usize,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out, printed: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print_delta(&mut self, text: &str) {
        if let Some(delta) = text.get(self.printed..) {
            let _ = self.out.write_all(delta.as_bytes());
            let _ = self.out.flush();
        }
        self.printed = text.len();
    }

    fn end_line(&mut self) {
        if self.printed > 0 {
            let _ = writeln!(self.out);
        }
    }
}

impl<W: Write> RenderView for TerminalView<W> {
    fn show(&mut self, update: &RenderUpdate) {
        match update {
            RenderUpdate::Started { .. } => {
                self.printed = 0;
            }
            RenderUpdate::SourcesAttached { citations } => {
                for citation in citations {
                    let preview: String = citation.preview.chars().take(80).collect();
                    let _ = writeln!(self.out, "[{}] {}", citation.label, preview.replace('\n', " "));
                }
                if !citations.is_empty() {
                    let _ = writeln!(self.out);
                }
            }
            RenderUpdate::Partial { html } => self.print_delta(html),
            RenderUpdate::Finalized { html } => {
                self.print_delta(html);
                self.end_line();
            }
            RenderUpdate::Aborted {
                message,
                partial_text,
            } => {
                self.end_line();
                if partial_text.is_some() {
                    let _ = writeln!(self.out, "[answer incomplete]");
                }
                let _ = writeln!(self.out, "error: {}", message);
            }
            RenderUpdate::Cancelled => {
                self.end_line();
                let _ = writeln!(self.out, "[cancelled]");
            }
        }
    }
}
