pub mod message;
pub mod session;

pub use message::{ChatMessage, MessageAttachment, Role, SourceCitation};
pub use session::SessionSummary;
