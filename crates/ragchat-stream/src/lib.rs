pub mod buffer_utils;
pub mod client;
pub mod error;
pub mod streaming;
pub mod traits;

pub use buffer_utils::{parse_record, DEFAULT_MAX_RECORD_BYTES, parse_sse_stream, SseFrameDecoder, SseRecordBuffer, Utf8StreamDecoder};
pub use client::{extract_detail, StreamingChatClient, StreamingChatClientBuilder};
pub use error::{Result, StreamError};
pub use streaming::{CancelHandle, ChatStream, EventStream};
pub use traits::ChatTransport;

pub use ragchat_types::{ChatQuery, ChatReply, Source, SourcesPayload, StreamEvent};
