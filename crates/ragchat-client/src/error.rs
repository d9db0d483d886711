use ragchat_notify::NotifyError;
use ragchat_stream::StreamError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// A reply is still streaming for this conversation
    #[error("A reply is already in progress for conversation {0}")]
    TurnInFlight(i64),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("HTTP {status}: {detail}")]
    Http { status: u16, detail: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ClientError {
    /// Message meant for the user; server details are surfaced verbatim
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Stream(e) => e.user_message(),
            ClientError::Http { detail, .. } if !detail.is_empty() => detail.clone(),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
