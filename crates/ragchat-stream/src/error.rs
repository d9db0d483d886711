use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Non-2xx status seen before any body was read
    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    /// Request never reached the server or the connection dropped mid-stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// Body ended inside an unterminated record
    #[error("Stream truncated with {pending_bytes} bytes of an incomplete record")]
    Truncated { pending_bytes: usize },

    /// A single record grew past the size limit without being terminated
    #[error("SSE record exceeds {limit} bytes without a delimiter")]
    RecordTooLarge { limit: usize },

    /// One record could not be decoded; the stream continues
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String, payload: String },

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// Whether this error ends the stream
    ///
    /// Malformed frames are isolated: the records after them are still delivered.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamError::MalformedFrame { .. })
    }

    /// Message meant for the user; application errors are surfaced verbatim
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Http { detail, .. } if !detail.is_empty() => detail.clone(),
            StreamError::Http { status, .. } => format!("Request failed with status {}", status),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(e: reqwest::Error) -> Self {
        StreamError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
