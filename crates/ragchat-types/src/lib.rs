pub mod events;
pub mod notification;
pub mod request;

pub use events::{ErrorPayload, GraphMetadata, Source, SourcesPayload, StreamEvent, WireFrame};
pub use notification::{JobComplete, JobFailure, JobProgress, Notification, KEEPALIVE_ACK};
pub use request::{ChatQuery, ChatReply, UploadReceipt};
