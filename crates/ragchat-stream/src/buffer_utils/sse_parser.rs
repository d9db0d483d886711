use futures::{Stream, StreamExt};
use ragchat_types::StreamEvent;
use std::fmt::Display;
use std::pin::Pin;

use super::buffering::{SseRecordBuffer, DEFAULT_MAX_RECORD_BYTES};
use super::decoder::Utf8StreamDecoder;
use crate::error::{Result, StreamError};

const DATA_PREFIX: &str = "data:";

/// Decode one SSE record into an event
///
/// Returns None for records that carry no `data:` line (comments, `id:`/`event:` only).
/// Several `data:` lines in one record are joined with `\n`, as SSE prescribes.
pub fn parse_record(record: &str) -> Option<Result<StreamEvent>> {
    let mut payload: Option<String> = None;

    for line in record.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);

        match payload.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(data);
            }
            None => payload = Some(data.to_string()),
        }
    }

    let payload = payload?;

    Some(
        serde_json::from_str::<StreamEvent>(&payload).map_err(|e| StreamError::MalformedFrame {
            reason: e.to_string(),
            payload,
        }),
    )
}

/// Bytes in, events out
///
/// Combines the incremental UTF-8 decoder with the record buffer so that neither
/// character nor record boundaries need to line up with read boundaries.
pub struct SseFrameDecoder {
    decoder: Utf8StreamDecoder,
    records: SseRecordBuffer,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::with_max_record(DEFAULT_MAX_RECORD_BYTES)
    }

    /// Decoder that gives up once one unterminated record exceeds `max_record` bytes
    pub fn with_max_record(max_record: usize) -> Self {
        Self {
            decoder: Utf8StreamDecoder::new(),
            records: SseRecordBuffer::with_capacity(8192).with_max_record(max_record),
        }
    }

    /// Feed one network chunk; returns every record it completed, in order
    ///
    /// If the unterminated remainder is then over the size limit, a terminal
    /// [`StreamError::RecordTooLarge`] follows and the remainder is discarded.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent>> {
        let text = self.decoder.decode(bytes);
        self.records.push_str(&text);

        let mut events = Vec::new();
        while let Some(record) = self.records.next_record() {
            if let Some(parsed) = parse_record(&record) {
                events.push(parsed);
            }
        }

        if self.records.is_over_limit() {
            let limit = self.records.max_record();
            self.records.clear();
            events.push(Err(StreamError::RecordTooLarge { limit }));
        }
        events
    }

    /// Signal end of input
    ///
    /// An unterminated trailing record is dropped and reported as truncation.
    pub fn finish(&mut self) -> Option<StreamError> {
        let tail = self.decoder.finish();
        self.records.push_str(&tail);

        self.records
            .take_remainder()
            .map(|rest| StreamError::Truncated {
                pending_bytes: rest.len(),
            })
    }
}

impl Default for SseFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a raw byte stream into an ordered stream of chat events
///
/// Delivery stops after the first terminal item: a `done`/`error` event or any
/// terminal [`StreamError`] (transport failure, oversized record, truncation at end of input). Malformed records are yielded as
/// non-terminal errors and the stream keeps going.
pub fn parse_sse_stream<S, B, E>(bytes: S) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut frames = SseFrameDecoder::new();

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(chunk) => {
                    for item in frames.push(chunk.as_ref()) {
                        match &item {
                            Ok(event) => tracing::debug!(kind = event.kind(), "SSE frame"),
                            Err(e) if e.is_terminal() => tracing::error!("SSE stream failed: {}", e),
                            Err(e) => tracing::warn!("Skipping SSE record: {}", e),
                        }

                        let terminal = match &item {
                            Ok(event) => event.is_terminal(),
                            Err(e) => e.is_terminal(),
                        };
                        yield item;
                        if terminal {
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Stream error: {}", e);
                    yield Err(StreamError::Transport(e.to_string()));
                    return;
                }
            }
        }

        if let Some(truncated) = frames.finish() {
            tracing::warn!("{}", truncated);
            yield Err(truncated);
        }
    })
}
