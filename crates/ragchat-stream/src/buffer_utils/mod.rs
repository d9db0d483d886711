mod buffering;
mod decoder;
mod sse_parser;

pub use buffering::{SseRecordBuffer, DEFAULT_MAX_RECORD_BYTES};
pub use decoder::Utf8StreamDecoder;
pub use sse_parser::{parse_record, parse_sse_stream, SseFrameDecoder};
