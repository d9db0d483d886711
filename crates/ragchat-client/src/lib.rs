pub mod config;
pub mod error;
pub mod ingestion;
pub mod session;
pub mod terminal;
pub mod upload;

pub use config::{ChatDefaults, Config, LoggingConfig, NotifyConfig, ServerConfig};
pub use error::{ClientError, Result};
pub use ingestion::{IngestionJobs, IngestionState, IngestionTracker};
pub use session::{ChatSession, StreamingTurn, TurnGuard};
pub use terminal::{RawTextRenderer, TerminalView};
pub use upload::Uploader;
