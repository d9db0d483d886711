use ragchat_stream::StreamError;
use ragchat_types::StreamEvent;

use crate::citations::{citations, Citation};
use crate::pending::PendingMessage;
use crate::renderer::{escape_html, MarkdownRenderer, MessageRenderer};

/// Shown when the stream fails or ends before the server signalled completion
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "Connection to the server was lost before the answer was complete.";

/// What the view should change after one stream item
#[derive(Debug, Clone, PartialEq)]
pub enum RenderUpdate {
    /// Replace the "awaiting response" placeholder with the message bubble
    Started { message_id: String },

    SourcesAttached { citations: Vec<Citation> },

    /// Live render of everything received so far
    Partial { html: String },

    /// Authoritative render of the complete answer
    Finalized { html: String },

    /// Remove the streaming bubble and show an error bubble instead
    ///
    /// `partial_text` carries whatever text had arrived, to be shown marked as incomplete.
    Aborted {
        message: String,
        partial_text: Option<String>,
    },

    /// The user stopped the turn; no error is shown
    Cancelled,
}

/// Folds the events of one chat request into a single [`PendingMessage`]
///
/// The first item of any kind creates the message. Every item returns the view updates it
/// causes, in order. Items arriving after the message was finalized or aborted are ignored.
pub struct IncrementalRenderer<R = MarkdownRenderer> {
    renderer: R,
    message: Option<PendingMessage>,
}

impl Default for IncrementalRenderer<MarkdownRenderer> {
    fn default() -> Self {
        Self::new(MarkdownRenderer)
    }
}

impl<R: MessageRenderer> IncrementalRenderer<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            message: None,
        }
    }

    pub fn message(&self) -> Option<&PendingMessage> {
        self.message.as_ref()
    }

    pub fn into_message(self) -> Option<PendingMessage> {
        self.message
    }

    /// True once the message is finalized or aborted
    pub fn is_terminal(&self) -> bool {
        self.message
            .as_ref()
            .is_some_and(|message| message.state().is_terminal())
    }

    /// Apply one item exactly as a [`ragchat_stream::ChatStream`] yields it
    pub fn apply(&mut self, item: Result<StreamEvent, StreamError>) -> Vec<RenderUpdate> {
        match item {
            Ok(event) => self.apply_event(event),
            Err(error) => self.apply_error(&error),
        }
    }

    pub fn apply_event(&mut self, event: StreamEvent) -> Vec<RenderUpdate> {
        let mut updates = Vec::new();
        if self.ignore_late(event.kind()) {
            return updates;
        }

        self.start(&mut updates);
        let Some(message) = self.message.as_mut() else {
            return updates;
        };

        match event {
            StreamEvent::Sources(payload) => {
                tracing::debug!(
                    message_id = message.id(),
                    count = payload.sources.len(),
                    retrieval_count = payload.retrieval_count,
                    "Sources attached"
                );
                let cited = citations(&payload.sources);
                if message.attach_sources(payload.sources).is_some() {
                    tracing::warn!(
                        message_id = message.id(),
                        "Second sources event in one stream, replacing the earlier sources"
                    );
                }
                updates.push(RenderUpdate::SourcesAttached { citations: cited });
            }
            StreamEvent::Text(fragment) => {
                message.append(&fragment);
                let html = render_or_escape(&self.renderer, message.accumulated_text());
                message.set_rendered(html.clone());
                updates.push(RenderUpdate::Partial { html });
            }
            StreamEvent::Done => {
                let html = render_or_escape(&self.renderer, message.accumulated_text());
                message.set_rendered(html.clone());
                message.finalize();
                tracing::info!(
                    message_id = message.id(),
                    chars = message.accumulated_text().chars().count(),
                    "Assistant message finalized"
                );
                updates.push(RenderUpdate::Finalized { html });
            }
            StreamEvent::Error(payload) => {
                tracing::error!(message_id = message.id(), "Server reported an error: {}", payload.error);
                updates.push(abort(message, payload.error));
            }
        }

        updates
    }

    /// Malformed frames are skipped; every other error aborts the message
    pub fn apply_error(&mut self, error: &StreamError) -> Vec<RenderUpdate> {
        let mut updates = Vec::new();
        if self.ignore_late("error") {
            return updates;
        }

        self.start(&mut updates);
        let Some(message) = self.message.as_mut() else {
            return updates;
        };

        if !error.is_terminal() {
            tracing::warn!(message_id = message.id(), "Skipping bad frame: {}", error);
            return updates;
        }

        tracing::error!(message_id = message.id(), "Chat stream failed: {}", error);
        let surfaced = match error {
            StreamError::Http { .. } => error.user_message(),
            _ => TRANSPORT_FAILURE_MESSAGE.to_string(),
        };
        updates.push(abort(message, surfaced));

        updates
    }

    /// The stream ended; without a prior `done` or `error` this is a failure
    pub fn finish(&mut self) -> Vec<RenderUpdate> {
        let mut updates = Vec::new();
        if self.is_terminal() {
            return updates;
        }

        self.start(&mut updates);
        let Some(message) = self.message.as_mut() else {
            return updates;
        };

        tracing::warn!(message_id = message.id(), "Chat stream ended without a terminal event");
        updates.push(abort(message, TRANSPORT_FAILURE_MESSAGE.to_string()));

        updates
    }

    /// The user abandoned the turn
    pub fn cancel(&mut self) -> Vec<RenderUpdate> {
        if self.is_terminal() {
            return Vec::new();
        }

        if let Some(message) = self.message.as_mut() {
            tracing::info!(message_id = message.id(), "Assistant message cancelled");
            message.abort(None);
        }

        vec![RenderUpdate::Cancelled]
    }

    fn start(&mut self, updates: &mut Vec<RenderUpdate>) {
        if self.message.is_none() {
            let message = PendingMessage::new();
            tracing::debug!(message_id = message.id(), "Assistant message started");
            updates.push(RenderUpdate::Started {
                message_id: message.id().to_string(),
            });
            self.message = Some(message);
        }

        if let Some(message) = self.message.as_mut() {
            message.begin_streaming();
        }
    }

    fn ignore_late(&self, kind: &str) -> bool {
        match &self.message {
            Some(message) if message.state().is_terminal() => {
                tracing::debug!(
                    message_id = message.id(),
                    state = ?message.state(),
                    "Ignoring late {} item",
                    kind
                );
                true
            }
            _ => false,
        }
    }
}

fn render_or_escape<R: MessageRenderer>(renderer: &R, text: &str) -> String {
    match renderer.render(text) {
        Ok(html) => html,
        Err(e) => {
            tracing::debug!("Renderer failed, showing raw text: {:#}", e);
            escape_html(text)
        }
    }
}

fn abort(message: &mut PendingMessage, error: String) -> RenderUpdate {
    message.abort(Some(error.clone()));
    let partial_text = message
        .is_incomplete()
        .then(|| message.accumulated_text().to_string());

    RenderUpdate::Aborted {
        message: error,
        partial_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::MessageState;
    use ragchat_types::{Source, SourcesPayload};

    fn sources(names: &[&str]) -> StreamEvent {
        StreamEvent::Sources(SourcesPayload {
            sources: names.iter().map(|n| Source::new(*n, 0.5)).collect(),
            retrieval_count: names.len() as u32,
        })
    }

    #[test]
    fn test_first_item_starts_exactly_one_message() {
        let mut renderer = IncrementalRenderer::default();

        let first = renderer.apply_event(StreamEvent::text("a"));
        assert!(matches!(first[0], RenderUpdate::Started { .. }));
        assert!(matches!(first[1], RenderUpdate::Partial { .. }));

        let second = renderer.apply_event(StreamEvent::text("b"));
        assert_eq!(second.len(), 1);

        let message = renderer.message().unwrap();
        assert_eq!(message.state(), MessageState::Streaming);
        assert_eq!(message.accumulated_text(), "ab");
    }

    #[test]
    fn test_second_sources_event_overwrites() {
        let mut renderer = IncrementalRenderer::default();
        renderer.apply_event(sources(&["a", "b"]));
        renderer.apply_event(sources(&["c"]));

        let attached = renderer.message().unwrap().sources().unwrap();
        assert_eq!(attached.len(), 1);
        assert_eq!(attached[0].content, "c");
    }

    #[test]
    fn test_renderer_failure_falls_back_to_escaped_text() {
        let failing = |_: &str| -> anyhow::Result<String> { anyhow::bail!("unclosed fence") };
        let mut renderer = IncrementalRenderer::new(failing);

        let updates = renderer.apply_event(StreamEvent::text("<b>bold"));
        assert_eq!(
            updates.last(),
            Some(&RenderUpdate::Partial {
                html: "&lt;b&gt;bold".to_string()
            })
        );
    }

    #[test]
    fn test_default_renderer_formats_markdown_on_finalize() {
        let mut renderer = IncrementalRenderer::default();
        renderer.apply_event(StreamEvent::text("Use `cargo` **now**"));

        let updates = renderer.apply_event(StreamEvent::Done);
        assert_eq!(
            updates,
            vec![RenderUpdate::Finalized {
                html: "<p>Use <code>cargo</code> <strong>now</strong></p>".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_frame_is_not_terminal() {
        let mut renderer = IncrementalRenderer::default();
        renderer.apply_event(StreamEvent::text("a"));

        let updates = renderer.apply_error(&StreamError::MalformedFrame {
            reason: "EOF".to_string(),
            payload: "{".to_string(),
        });
        assert!(updates.is_empty());
        assert!(!renderer.is_terminal());

        renderer.apply_event(StreamEvent::text("b"));
        assert_eq!(renderer.message().unwrap().accumulated_text(), "ab");
    }

    #[test]
    fn test_items_after_done_are_ignored() {
        let mut renderer = IncrementalRenderer::default();
        renderer.apply_event(StreamEvent::text("x"));
        renderer.apply_event(StreamEvent::Done);

        assert!(renderer.apply_event(StreamEvent::text("late")).is_empty());
        assert!(renderer.apply_error(&StreamError::Transport("reset".into())).is_empty());
        assert!(renderer.finish().is_empty());
        assert!(renderer.cancel().is_empty());
        assert_eq!(renderer.message().unwrap().accumulated_text(), "x");
        assert_eq!(renderer.message().unwrap().state(), MessageState::Finalized);
    }

    #[test]
    fn test_http_error_surfaces_detail() {
        let mut renderer = IncrementalRenderer::default();
        let updates = renderer.apply_error(&StreamError::Http {
            status: 429,
            detail: "Too many requests".to_string(),
        });

        assert_eq!(
            updates.last(),
            Some(&RenderUpdate::Aborted {
                message: "Too many requests".to_string(),
                partial_text: None
            })
        );
    }

    #[test]
    fn test_cancel_is_not_an_error() {
        let mut renderer = IncrementalRenderer::default();
        renderer.apply_event(StreamEvent::text("half"));

        assert_eq!(renderer.cancel(), vec![RenderUpdate::Cancelled]);
        let message = renderer.message().unwrap();
        assert_eq!(message.state(), MessageState::Aborted);
        assert_eq!(message.error(), None);
        assert!(!message.is_incomplete());
    }
}
