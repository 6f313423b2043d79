//! REST client for the memory backend.
//!
//! The five remote operations the client consumes, behind the
//! `MemoryApi` trait so the conversation layer can be exercised against
//! an in-process fake.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::models::{ChatMessage, MessageAttachment, Role, SessionSummary, SourceCitation};

/// Structured body for a text-only send. `session_id` is omitted for
/// the first message of a new conversation.
#[derive(Debug, Clone, Serialize)]
pub struct TextMessageRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timezone_offset_minutes: i32,
}

#[derive(Debug)]
pub struct ImagePayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Multipart body for an image-bearing send.
#[derive(Debug)]
pub struct ImageMessageRequest {
    pub text: String,
    pub session_id: Option<String>,
    pub timezone_offset_minutes: i32,
    pub image: ImagePayload,
}

/// Assistant reply to either send shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAttachment {
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    #[serde(default)]
    pub attachments: Vec<RemoteAttachment>,
}

impl From<RemoteMessage> for ChatMessage {
    fn from(remote: RemoteMessage) -> Self {
        ChatMessage {
            id: remote.id,
            role: remote.role,
            content: remote.content,
            created_at: remote.created_at,
            sources: remote.sources,
            attachments: remote
                .attachments
                .into_iter()
                .map(|a| MessageAttachment::Remote {
                    url: a.url,
                    content_type: a.content_type,
                })
                .collect(),
        }
    }
}

/// Full message history for one session.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDetail {
    pub id: String,
    pub messages: Vec<RemoteMessage>,
}

/// Detail record for an archived memory item. Only the fields the
/// conversation layer consumes are modeled.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryItemDetail {
    pub id: String,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
}

#[async_trait]
pub trait MemoryApi: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>>;
    async fn session_detail(&self, session_id: &str) -> Result<SessionDetail>;
    async fn send_text(&self, request: TextMessageRequest) -> Result<ChatReply>;
    async fn send_image(&self, request: ImageMessageRequest) -> Result<ChatReply>;
    async fn memory_item(&self, item_id: &str) -> Result<MemoryItemDetail>;
}

/// Production client speaking JSON (and multipart for image sends) to
/// the backend.
pub struct HttpMemoryApi {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpMemoryApi {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(ref token) = self.auth_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Memory API error ({}) on {}: {}", status, what, error_text);
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }
}

#[async_trait]
impl MemoryApi for HttpMemoryApi {
    async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let response = self
            .request(reqwest::Method::GET, "/chat/sessions")
            .send()
            .await
            .context("Failed to request session list")?;
        Self::read_json(response, "session list").await
    }

    async fn session_detail(&self, session_id: &str) -> Result<SessionDetail> {
        let response = self
            .request(reqwest::Method::GET, &format!("/chat/sessions/{}", session_id))
            .send()
            .await
            .context("Failed to request session detail")?;
        Self::read_json(response, "session detail").await
    }

    async fn send_text(&self, request: TextMessageRequest) -> Result<ChatReply> {
        let response = self
            .request(reqwest::Method::POST, "/chat")
            .json(&request)
            .send()
            .await
            .context("Failed to send chat message")?;
        Self::read_json(response, "chat reply").await
    }

    async fn send_image(&self, request: ImageMessageRequest) -> Result<ChatReply> {
        let image = Part::bytes(request.image.bytes)
            .file_name(request.image.file_name)
            .mime_str(&request.image.content_type)
            .context("Invalid attachment content type")?;

        let mut form = Form::new()
            .text("text", request.text)
            .text(
                "timezone_offset_minutes",
                request.timezone_offset_minutes.to_string(),
            )
            .part("image", image);
        if let Some(session_id) = request.session_id {
            form = form.text("session_id", session_id);
        }

        let response = self
            .request(reqwest::Method::POST, "/chat/image")
            .multipart(form)
            .send()
            .await
            .context("Failed to send image message")?;
        Self::read_json(response, "chat reply").await
    }

    async fn memory_item(&self, item_id: &str) -> Result<MemoryItemDetail> {
        let response = self
            .request(reqwest::Method::GET, &format!("/memories/{}", item_id))
            .send()
            .await
            .context("Failed to request memory detail")?;
        Self::read_json(response, "memory detail").await
    }
}
