use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attachment::PreviewHandle;
use crate::constants::WELCOME_MESSAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Present in remote payloads only; filtered before display
    System,
}

/// Reference to a memory item surfaced alongside an assistant reply.
///
/// `context_id` is always present and serves as a stable render key.
/// Navigation ("jump to this memory") is only offered when `item_id`
/// is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCitation {
    pub context_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl SourceCitation {
    pub fn can_navigate(&self) -> bool {
        self.item_id.is_some()
    }
}

/// An attachment rendered with a message: either a local preview handle
/// (optimistic echo, shown before upload completes) or a remote URL
/// (messages hydrated from the backend).
#[derive(Debug, Clone)]
pub enum MessageAttachment {
    Preview(PreviewHandle),
    Remote {
        url: String,
        content_type: Option<String>,
    },
}

/// A single transcript entry. Append-only once in the log; ids are
/// unique within a session and ordering is insertion order.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub sources: Vec<SourceCitation>,
    pub attachments: Vec<MessageAttachment>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// The canned greeting substituted whenever a transcript would
    /// otherwise be empty.
    pub fn welcome() -> Self {
        Self::new(Role::Assistant, WELCOME_MESSAGE)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            sources: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_attachment(mut self, attachment: MessageAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}
