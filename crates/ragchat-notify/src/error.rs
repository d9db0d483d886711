use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    /// `send` was called while the socket was not open; nothing was queued
    #[error("Notification socket is not connected")]
    NotConnected,

    #[error("Invalid socket origin: {0}")]
    InvalidOrigin(String),

    #[error("Failed to serialize outgoing message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The socket task has stopped and can no longer take commands
    #[error("Notification socket task has shut down")]
    Shutdown,
}

impl From<url::ParseError> for NotifyError {
    fn from(e: url::ParseError) -> Self {
        NotifyError::InvalidOrigin(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
