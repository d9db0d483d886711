//! Notification channel for the RagChat backend
//!
//! A [`NotificationSocket`] keeps one WebSocket open to `/ws/{client_id}`, sends a keepalive on a
//! fixed interval and reconnects after unexpected closes up to a fixed number of attempts. Incoming
//! JSON frames are dispatched by their `type` field to the handler registered for it.

pub mod client_id;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod socket;
pub mod state;
pub mod transport;

pub use client_id::ClientId;
pub use config::SocketConfig;
pub use endpoint::socket_url;
pub use error::{NotifyError, Result};
pub use handlers::{Dispatch, HandlerRegistry, NotificationHandler};
pub use socket::{NotificationSocket, SocketStatus};
pub use state::{ConnectionState, SocketAction, SocketInput, SocketMachine};
pub use transport::{Connector, FrameSink, FrameStream, SocketConnection, TungsteniteConnector};

pub use ragchat_types::{JobComplete, JobFailure, JobProgress, Notification};
