//! # RagChat
//!
//! Client core for a retrieval-augmented chat backend.
//!
//! ## Overview
//!
//! - **Stream answers** over `text/event-stream`, tolerant of arbitrary chunk boundaries
//! - **Render incrementally** from the accumulated text, with citations for retrieved sources
//! - **Follow ingestion** through a reconnecting WebSocket notification channel
//! - **One turn per conversation** enforced by the chat session
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ragchat::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = StreamingChatClient::new("http://localhost:8000/api")?;
//!     let session = ChatSession::new(Arc::new(client), ChatDefaults::default());
//!
//!     let mut renderer = IncrementalRenderer::default();
//!     let mut updates: Vec<RenderUpdate> = Vec::new();
//!     let query = session.query("What does the handbook say about onboarding?");
//!     session.send(1, &query, &mut renderer, &mut updates).await?;
//!
//!     for update in &updates {
//!         println!("{:?}", update);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`ragchat-types`**: wire types for events, notifications and requests
//! - **`ragchat-stream`**: SSE parsing and the streaming HTTP client
//! - **`ragchat-notify`**: notification socket with keepalive and reconnect
//! - **`ragchat-render`**: incremental renderer and pending message
//! - **`ragchat-client`**: chat session, uploads, configuration and the terminal client

pub use ragchat_types::{
    ChatQuery, ChatReply, JobComplete, JobFailure, JobProgress, Notification, Source,
    SourcesPayload, StreamEvent, UploadReceipt,
};

pub use ragchat_stream::{
    parse_sse_stream, CancelHandle, ChatStream, ChatTransport, StreamError, StreamingChatClient,
};

pub use ragchat_notify::{
    ClientId, ConnectionState, Connector, NotificationSocket, NotifyError, SocketConfig,
    SocketStatus,
};

pub use ragchat_render::{
    citations, drive, Citation, IncrementalRenderer, MarkdownRenderer, MessageRenderer,
    MessageState, PendingMessage, RenderUpdate, RenderView,
};

pub use ragchat_client::{
    ChatDefaults, ChatSession, ClientError, Config, IngestionTracker, StreamingTurn, Uploader,
};

/// Convenient prelude with commonly used types
pub mod prelude {
    pub use crate::{
        ChatDefaults, ChatQuery, ChatSession, ChatStream, ChatTransport, ClientId, Config,
        IncrementalRenderer, IngestionTracker, MessageRenderer, NotificationSocket, RenderUpdate,
        RenderView, SocketConfig, StreamEvent, StreamingChatClient, Uploader,
    };
}
