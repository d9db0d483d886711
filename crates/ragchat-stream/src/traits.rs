use async_trait::async_trait;
use ragchat_types::{ChatQuery, ChatReply};

use crate::error::Result;
use crate::streaming::ChatStream;

/// Trait for chat backends
///
/// Provides both the streaming and the non-streaming chat endpoints for one
/// conversation. [`crate::StreamingChatClient`] is the HTTP implementation.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Non-streaming chat: the whole answer in one response
    async fn chat(&self, conversation_id: i64, query: &ChatQuery) -> Result<ChatReply>;

    /// Streaming chat: events as the server produces them
    async fn chat_stream(&self, conversation_id: i64, query: &ChatQuery) -> Result<ChatStream>;
}
