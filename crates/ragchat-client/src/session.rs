// One chat turn at a time per conversation

use parking_lot::Mutex;
use ragchat_render::{drive, IncrementalRenderer, MessageRenderer, PendingMessage, RenderView};
use ragchat_stream::{CancelHandle, ChatStream, ChatTransport};
use ragchat_types::{ChatQuery, ChatReply};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ChatDefaults;
use crate::error::{ClientError, Result};

/// Sends chat turns and keeps at most one in flight per conversation
///
/// Different conversations may stream concurrently. The in-flight mark is held by a
/// [`TurnGuard`] and released when the turn is finalized, aborted, cancelled or dropped.
#[derive(Clone)]
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    defaults: ChatDefaults,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>, defaults: ChatDefaults) -> Self {
        Self {
            transport,
            defaults,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn defaults(&self) -> &ChatDefaults {
        &self.defaults
    }

    /// Query for `text` with this session's parameters
    pub fn query(&self, text: impl Into<String>) -> ChatQuery {
        self.defaults.query(text)
    }

    pub fn is_in_flight(&self, conversation_id: i64) -> bool {
        self.in_flight.lock().contains(&conversation_id)
    }

    /// Mark a turn as in flight; fails fast if one already is
    pub fn begin_turn(&self, conversation_id: i64) -> Result<TurnGuard> {
        if !self.in_flight.lock().insert(conversation_id) {
            tracing::warn!(conversation_id, "Rejected chat request, a reply is still in progress");
            return Err(ClientError::TurnInFlight(conversation_id));
        }

        Ok(TurnGuard {
            conversation_id,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Open the streaming request for one turn
    ///
    /// A rejected request (non-2xx) is returned as an error before any event is read.
    pub async fn start_stream(&self, conversation_id: i64, query: &ChatQuery) -> Result<StreamingTurn> {
        let guard = self.begin_turn(conversation_id)?;
        tracing::info!(conversation_id, "Sending streaming chat request");

        let stream = self.transport.chat_stream(conversation_id, query).await?;

        Ok(StreamingTurn { stream, guard })
    }

    /// Stream one turn into `view`
    ///
    /// Failures to open the stream are rendered as an aborted message like any other failure,
    /// so only [`ClientError::TurnInFlight`] is returned as an error.
    pub async fn send<R, V>(
        &self,
        conversation_id: i64,
        query: &ChatQuery,
        renderer: &mut IncrementalRenderer<R>,
        view: &mut V,
    ) -> Result<Option<PendingMessage>>
    where
        R: MessageRenderer,
        V: RenderView + ?Sized,
    {
        match self.start_stream(conversation_id, query).await {
            Ok(turn) => {
                turn.render(renderer, view).await;
            }
            Err(ClientError::Stream(error)) => {
                for update in renderer.apply_error(&error) {
                    view.show(&update);
                }
            }
            Err(other) => return Err(other),
        }

        Ok(renderer.message().cloned())
    }

    /// Non-streaming turn: the whole answer in one response
    pub async fn ask(&self, conversation_id: i64, query: &ChatQuery) -> Result<ChatReply> {
        let _guard = self.begin_turn(conversation_id)?;
        tracing::info!(conversation_id, "Sending chat request");

        let reply = self.transport.chat(conversation_id, query).await?;
        Ok(reply)
    }
}

/// Releases the conversation's in-flight mark on drop
#[derive(Debug)]
pub struct TurnGuard {
    conversation_id: i64,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl TurnGuard {
    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.conversation_id);
        tracing::debug!(conversation_id = self.conversation_id, "Chat turn released");
    }
}

/// An open streaming turn that still holds its conversation's in-flight mark
pub struct StreamingTurn {
    stream: ChatStream,
    guard: TurnGuard,
}

impl StreamingTurn {
    pub fn conversation_id(&self) -> i64 {
        self.guard.conversation_id()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.stream.cancel_handle()
    }

    /// Render the rest of the stream, then release the conversation
    pub async fn render<R, V>(self, renderer: &mut IncrementalRenderer<R>, view: &mut V)
    where
        R: MessageRenderer,
        V: RenderView + ?Sized,
    {
        let StreamingTurn { stream, guard } = self;
        drive(stream, renderer, view).await;
        drop(guard);
    }

    /// Hand the raw stream to the caller; the guard stays with it
    pub fn into_parts(self) -> (ChatStream, TurnGuard) {
        (self.stream, self.guard)
    }
}
