//! Conversation session controller.
//!
//! Owns the active session's message log, mediates between the
//! optimistic local echo and the authoritative remote reply, and issues
//! outbound requests. The `sending` flag is the single piece of mutual
//! exclusion: the controller is driven from one task, so an advisory
//! check before dispatch is sufficient to stop duplicate sends.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::api::{ChatReply, ImageMessageRequest, ImagePayload, MemoryApi, TextMessageRequest};
use crate::attachment::{AttachmentSelector, PreviewHandle, PreviewRegistry, RejectionFeedback};
use crate::config::CoreConfig;
use crate::constants::{IMAGE_ONLY_PLACEHOLDER, SEND_FAILURE_REPLY};
use crate::directory::SessionDirectory;
use crate::events::{EventBus, FocusMode, TimelineFocus};
use crate::models::{ChatMessage, MessageAttachment, SourceCitation};
use crate::storage::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// Text entered and/or an image attached, nothing sent yet
    Composing,
    /// A request is in flight; further sends are ignored
    Sending,
}

pub struct ChatController<A> {
    api: Arc<A>,
    bus: EventBus,
    store: SessionStore,
    directory: SessionDirectory<A>,
    selector: AttachmentSelector,
    cancel: CancellationToken,
    send_timeout: Option<Duration>,
    session_id: Option<String>,
    messages: Vec<ChatMessage>,
    input: String,
    sending: bool,
}

impl<A: MemoryApi> ChatController<A> {
    pub fn new(api: Arc<A>, bus: EventBus, registry: PreviewRegistry, config: &CoreConfig) -> Self {
        let store = SessionStore::new(&config.data_dir);
        let session_id = store.load();
        Self {
            directory: SessionDirectory::new(api.clone()),
            selector: AttachmentSelector::new(registry, bus.clone()),
            api,
            bus,
            store,
            cancel: CancellationToken::new(),
            send_timeout: config.send_timeout,
            session_id,
            messages: vec![ChatMessage::welcome()],
            input: String::new(),
            sending: false,
        }
    }

    pub fn state(&self) -> ControllerState {
        if self.sending {
            ControllerState::Sending
        } else if !self.input.trim().is_empty() || self.selector.current().is_some() {
            ControllerState::Composing
        } else {
            ControllerState::Idle
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn directory(&self) -> &SessionDirectory<A> {
        &self.directory
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn attach(&mut self, path: &std::path::Path, content_type: &str) {
        self.selector.select(path, content_type);
    }

    pub fn remove_attachment(&mut self) {
        self.selector.remove();
    }

    pub fn pending_attachment(&self) -> Option<&PreviewHandle> {
        self.selector.current()
    }

    pub fn set_rejection_feedback(&mut self, feedback: RejectionFeedback) {
        self.selector.set_feedback(feedback);
    }

    /// Refresh the sidebar's session list, unless torn down first.
    pub async fn refresh_directory(&mut self) -> bool {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => false,
            updated = self.directory.refresh() => updated,
        }
    }

    /// Hydrate the persisted session, if any, so a restart resumes the
    /// same conversation.
    pub async fn resume(&mut self) {
        let Some(session_id) = self.session_id.clone() else {
            return;
        };
        if !self.select_session(&session_id).await {
            tracing::warn!(session_id = %session_id, "could not resume persisted session");
        }
    }

    /// Submit the composed input. A no-op while a send is in flight or
    /// when there is neither text nor an attachment. The input field and
    /// attachment selection are cleared synchronously, before any
    /// network outcome is known.
    pub async fn send(&mut self) {
        if self.sending {
            tracing::debug!("send ignored: a request is already in flight");
            return;
        }
        let text = self.input.trim().to_string();
        self.input.clear();
        let attachment = self.selector.take();
        if text.is_empty() && attachment.is_none() {
            return;
        }

        let content = if text.is_empty() {
            IMAGE_ONLY_PLACEHOLDER.to_string()
        } else {
            text.clone()
        };
        let mut optimistic = ChatMessage::user(content);
        if let Some(ref handle) = attachment {
            optimistic = optimistic.with_attachment(MessageAttachment::Preview(handle.clone()));
        }
        self.messages.push(optimistic);
        self.sending = true;

        match self.dispatch(text, attachment).await {
            Some(Ok(reply)) => {
                self.adopt_session(&reply.session_id);
                self.messages
                    .push(ChatMessage::assistant(reply.message).with_sources(reply.sources));
                self.refresh_directory().await;
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "send failed");
                self.messages.push(ChatMessage::assistant(SEND_FAILURE_REPLY));
            }
            // torn down mid-flight; the result is discarded at the source
            None => {}
        }
        self.sending = false;
    }

    /// Issue exactly one outbound request: multipart when an image is
    /// attached, structured JSON otherwise. Returns `None` when the
    /// controller was cancelled before the reply landed.
    async fn dispatch(
        &self,
        text: String,
        attachment: Option<PreviewHandle>,
    ) -> Option<Result<ChatReply>> {
        let session_id = self.session_id.clone();
        let timezone_offset_minutes = local_timezone_offset_minutes();

        let request = async {
            match attachment {
                Some(handle) => {
                    let bytes = tokio::fs::read(&handle.path)
                        .await
                        .with_context(|| format!("Failed to read {}", handle.path.display()))?;
                    let file_name = handle
                        .path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .unwrap_or("attachment")
                        .to_string();
                    self.api
                        .send_image(ImageMessageRequest {
                            text,
                            session_id,
                            timezone_offset_minutes,
                            image: ImagePayload {
                                file_name,
                                content_type: handle.content_type.clone(),
                                bytes,
                            },
                        })
                        .await
                }
                None => {
                    self.api
                        .send_text(TextMessageRequest {
                            text,
                            session_id,
                            timezone_offset_minutes,
                        })
                        .await
                }
            }
        };
        let bounded = async {
            match self.send_timeout {
                Some(limit) => match tokio::time::timeout(limit, request).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!("send timed out after {:?}", limit)),
                },
                None => request.await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = bounded => Some(result),
        }
    }

    /// Start over: no active session, a fresh transcript holding only
    /// the welcome message, and no pending attachment.
    pub fn new_conversation(&mut self) {
        self.session_id = None;
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session id");
        }
        self.messages = vec![ChatMessage::welcome()];
        self.input.clear();
        self.selector.remove();
    }

    /// Switch to an existing session. On hydration failure the current
    /// transcript and session id are left unchanged.
    pub async fn select_session(&mut self, session_id: &str) -> bool {
        let cancel = self.cancel.clone();
        let hydrated = tokio::select! {
            _ = cancel.cancelled() => return false,
            hydrated = self.directory.hydrate(session_id) => hydrated,
        };
        let Some(messages) = hydrated else {
            return false;
        };
        self.messages = messages;
        self.adopt_session(session_id);
        true
    }

    /// A citation was activated. Without a source item id there is
    /// nothing to navigate to. A missing timestamp is resolved from the
    /// memory's detail record on a best-effort basis; failure does not
    /// block navigation. Exactly one focus signal is emitted.
    pub async fn activate_source(&self, citation: &SourceCitation) {
        let Some(ref item_id) = citation.item_id else {
            return;
        };

        let mut anchor = citation.timestamp;
        if anchor.is_none() {
            let cancel = self.cancel.clone();
            let detail = tokio::select! {
                _ = cancel.cancelled() => return,
                detail = self.api.memory_item(item_id) => detail,
            };
            match detail {
                Ok(detail) => anchor = detail.captured_at,
                Err(e) => {
                    tracing::warn!(item_id = %item_id, error = %e, "could not resolve memory timestamp");
                }
            }
        }

        self.bus.publish_focus(TimelineFocus {
            item_id: item_id.clone(),
            context_id: citation.context_id.clone(),
            mode: FocusMode::Day,
            anchor_date: anchor.map(|ts| ts.date_naive()),
        });
    }

    /// Cancel in-flight work and revoke every preview handle allocated
    /// over this controller's lifetime.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        self.selector.teardown();
    }

    fn adopt_session(&mut self, session_id: &str) {
        if self.session_id.as_deref() == Some(session_id) {
            return;
        }
        self.session_id = Some(session_id.to_string());
        if let Err(e) = self.store.save(session_id) {
            tracing::warn!(error = %e, "failed to persist active session id");
        }
    }
}

fn local_timezone_offset_minutes() -> i32 {
    chrono::Local::now().offset().local_minus_utc() / 60
}
