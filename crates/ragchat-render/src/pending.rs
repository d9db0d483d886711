use chrono::{DateTime, Utc};
use ragchat_types::Source;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    AwaitingFirstFrame,
    Streaming,
    Finalized,
    Aborted,
}

impl MessageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageState::Finalized | MessageState::Aborted)
    }
}

/// The assistant turn being streamed
///
/// The text is append-only until the message is finalized; only the renderer that owns the
/// message can change it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    id: String,
    accumulated_text: String,
    sources: Option<Vec<Source>>,
    state: MessageState,
    rendered: String,
    error: Option<String>,
    incomplete: bool,
    created_at: DateTime<Utc>,
}

impl PendingMessage {
    pub(crate) fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            accumulated_text: String::new(),
            sources: None,
            state: MessageState::AwaitingFirstFrame,
            rendered: String::new(),
            error: None,
            incomplete: false,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn sources(&self) -> Option<&[Source]> {
        self.sources.as_deref()
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    /// Output of the last render pass
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// Message surfaced to the user when the turn was aborted by a failure
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The turn failed after some text had arrived; that text is kept
    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn begin_streaming(&mut self) {
        if self.state == MessageState::AwaitingFirstFrame {
            self.state = MessageState::Streaming;
        }
    }

    pub(crate) fn append(&mut self, fragment: &str) {
        self.accumulated_text.push_str(fragment);
    }

    /// Returns the previous attachment, if any
    pub(crate) fn attach_sources(&mut self, sources: Vec<Source>) -> Option<Vec<Source>> {
        self.sources.replace(sources)
    }

    pub(crate) fn set_rendered(&mut self, rendered: String) {
        self.rendered = rendered;
    }

    pub(crate) fn finalize(&mut self) {
        self.state = MessageState::Finalized;
    }

    pub(crate) fn abort(&mut self, error: Option<String>) {
        self.state = MessageState::Aborted;
        self.incomplete = error.is_some() && !self.accumulated_text.is_empty();
        self.error = error;
    }
}
