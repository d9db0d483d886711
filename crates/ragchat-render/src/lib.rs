pub mod citations;
pub mod incremental;
pub mod pending;
pub mod renderer;
pub mod view;

pub use citations::{citations, Citation};
pub use incremental::{IncrementalRenderer, RenderUpdate, TRANSPORT_FAILURE_MESSAGE};
pub use pending::{MessageState, PendingMessage};
pub use renderer::{escape_html, MarkdownRenderer, MessageRenderer};
pub use view::{drive, RenderView};
