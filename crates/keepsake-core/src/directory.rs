//! Session directory: the sidebar's list of known conversations.

use std::sync::Arc;

use crate::api::MemoryApi;
use crate::models::{ChatMessage, Role, SessionSummary};

/// Lazily hydrated list of the user's sessions, in server recency
/// order. Fetch failures leave the cached list untouched and are logged
/// rather than surfaced; only send failures are user-visible.
pub struct SessionDirectory<A> {
    api: Arc<A>,
    sessions: Vec<SessionSummary>,
}

impl<A: MemoryApi> SessionDirectory<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            sessions: Vec::new(),
        }
    }

    /// Re-fetch the session list. Returns whether the list was updated.
    pub async fn refresh(&mut self) -> bool {
        match self.api.list_sessions().await {
            Ok(sessions) => {
                self.sessions = sessions;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to refresh session directory");
                false
            }
        }
    }

    pub fn sessions(&self) -> &[SessionSummary] {
        &self.sessions
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionSummary> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    /// Fetch the full history for a session. System messages are never
    /// shown; a history with nothing left after filtering becomes the
    /// single welcome message so the transcript is never blank. Returns
    /// `None` on a fetch failure (logged only).
    pub async fn hydrate(&self, session_id: &str) -> Option<Vec<ChatMessage>> {
        let detail = match self.api.session_detail(session_id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "failed to hydrate session");
                return None;
            }
        };

        let mut messages: Vec<ChatMessage> = detail
            .messages
            .into_iter()
            .filter(|m| m.role != Role::System)
            .map(ChatMessage::from)
            .collect();
        if messages.is_empty() {
            messages.push(ChatMessage::welcome());
        }
        Some(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        ChatReply, ImageMessageRequest, MemoryItemDetail, RemoteMessage, SessionDetail,
        TextMessageRequest,
    };
    use crate::constants::WELCOME_MESSAGE;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeApi {
        sessions: Vec<SessionSummary>,
        messages: Vec<RemoteMessage>,
        fail: AtomicBool,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                sessions: Vec::new(),
                messages: Vec::new(),
                fail: AtomicBool::new(false),
            }
        }

        fn failing(&self) -> bool {
            self.fail.load(Ordering::SeqCst)
        }
    }

    fn remote(id: &str, role: &str, content: &str) -> RemoteMessage {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "role": role,
            "content": content,
            "created_at": Utc::now(),
        }))
        .unwrap()
    }

    #[async_trait]
    impl MemoryApi for FakeApi {
        async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
            if self.failing() {
                anyhow::bail!("backend down");
            }
            Ok(self.sessions.clone())
        }

        async fn session_detail(&self, session_id: &str) -> Result<SessionDetail> {
            if self.failing() {
                anyhow::bail!("backend down");
            }
            Ok(SessionDetail {
                id: session_id.to_string(),
                messages: self.messages.clone(),
            })
        }

        async fn send_text(&self, _request: TextMessageRequest) -> Result<ChatReply> {
            anyhow::bail!("not used");
        }

        async fn send_image(&self, _request: ImageMessageRequest) -> Result<ChatReply> {
            anyhow::bail!("not used");
        }

        async fn memory_item(&self, _item_id: &str) -> Result<MemoryItemDetail> {
            anyhow::bail!("not used");
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_list() {
        let mut api = FakeApi::new();
        api.sessions.push(SessionSummary {
            id: "s1".to_string(),
            title: "Kyoto trip".to_string(),
            last_activity: Utc::now(),
            message_count: 4,
        });
        let mut directory = SessionDirectory::new(Arc::new(api));

        assert!(directory.refresh().await);
        assert_eq!(directory.sessions().len(), 1);
        assert_eq!(directory.get("s1").unwrap().title, "Kyoto trip");
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_list() {
        let mut api = FakeApi::new();
        api.sessions.push(SessionSummary {
            id: "s1".to_string(),
            title: "Kyoto trip".to_string(),
            last_activity: Utc::now(),
            message_count: 4,
        });
        let api = Arc::new(api);
        let mut directory = SessionDirectory::new(api.clone());
        assert!(directory.refresh().await);

        api.fail.store(true, Ordering::SeqCst);
        assert!(!directory.refresh().await);
        assert_eq!(directory.sessions().len(), 1);
        assert_eq!(directory.get("s1").unwrap().title, "Kyoto trip");
    }

    #[tokio::test]
    async fn test_hydrate_filters_system_messages() {
        let mut api = FakeApi::new();
        api.messages.push(remote("m1", "system", "internal prompt"));
        api.messages.push(remote("m2", "user", "hello"));
        api.messages.push(remote("m3", "assistant", "hi"));
        let directory = SessionDirectory::new(Arc::new(api));

        let log = directory.hydrate("s1").await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|m| m.role != Role::System));
        // insertion order preserved
        assert_eq!(log[0].id, "m2");
        assert_eq!(log[1].id, "m3");
    }

    #[tokio::test]
    async fn test_hydrate_empty_history_yields_welcome() {
        let mut api = FakeApi::new();
        api.messages.push(remote("m1", "system", "internal prompt"));
        let directory = SessionDirectory::new(Arc::new(api));

        let log = directory.hydrate("s1").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].content, WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn test_hydrate_failure_returns_none() {
        let api = FakeApi::new();
        api.fail.store(true, Ordering::SeqCst);
        let directory = SessionDirectory::new(Arc::new(api));
        assert!(directory.hydrate("s1").await.is_none());
    }
}
