//! Typed cross-component signals.
//!
//! Producers anywhere in the app publish over the bus without holding a
//! reference to the consumer; the toast viewport and the timeline view
//! are the two subscribers. Payload shapes are statically checked.

use chrono::NaiveDate;
use tokio::sync::broadcast;

use crate::toast::ToastVariant;

/// Request to show a toast. `title` is required; a request with an
/// empty title is dropped by the queue.
#[derive(Debug, Clone)]
pub struct ToastRequest {
    pub title: String,
    pub description: Option<String>,
    pub variant: Option<ToastVariant>,
    pub duration_ms: Option<i64>,
}

impl ToastRequest {
    pub fn info(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            variant: Some(ToastVariant::Info),
            duration_ms: None,
        }
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self {
            variant: Some(ToastVariant::Success),
            ..Self::info(title)
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self {
            variant: Some(ToastVariant::Error),
            ..Self::info(title)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Timeline presentation mode requested by a focus signal. Source
/// clicks always ask for the day view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    Day,
}

/// Fire-and-forget request for the timeline view to jump to a memory.
#[derive(Debug, Clone)]
pub struct TimelineFocus {
    pub item_id: String,
    pub context_id: String,
    pub mode: FocusMode,
    pub anchor_date: Option<NaiveDate>,
}

/// Broadcast channels connecting producers to the toast viewport and
/// the timeline view. Cheap to clone; constructed once at app start and
/// passed through the dependency boundary.
#[derive(Debug, Clone)]
pub struct EventBus {
    toast_tx: broadcast::Sender<ToastRequest>,
    focus_tx: broadcast::Sender<TimelineFocus>,
}

impl EventBus {
    pub fn new() -> Self {
        let (toast_tx, _) = broadcast::channel(64);
        let (focus_tx, _) = broadcast::channel(16);
        Self { toast_tx, focus_tx }
    }

    /// Publish a toast request. Delivery is best-effort: with no
    /// viewport subscribed the request is dropped.
    pub fn publish_toast(&self, request: ToastRequest) {
        if self.toast_tx.send(request).is_err() {
            tracing::debug!("toast published with no viewport subscribed");
        }
    }

    pub fn subscribe_toasts(&self) -> broadcast::Receiver<ToastRequest> {
        self.toast_tx.subscribe()
    }

    /// Emit a timeline focus signal. No acknowledgment is awaited.
    pub fn publish_focus(&self, focus: TimelineFocus) {
        if self.focus_tx.send(focus).is_err() {
            tracing::debug!("focus signal emitted with no timeline subscribed");
        }
    }

    pub fn subscribe_focus(&self) -> broadcast::Receiver<TimelineFocus> {
        self.focus_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_focus_signal_delivered_once() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_focus();

        bus.publish_focus(TimelineFocus {
            item_id: "mem-1".to_string(),
            context_id: "ctx-1".to_string(),
            mode: FocusMode::Day,
            anchor_date: None,
        });

        let focus = rx.recv().await.unwrap();
        assert_eq!(focus.item_id, "mem-1");
        assert_eq!(focus.mode, FocusMode::Day);
        // exactly one signal per emit
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_toast_request_defaults() {
        let req = ToastRequest::error("Upload failed").with_description("disk full");
        assert_eq!(req.variant, Some(ToastVariant::Error));
        assert_eq!(req.description.as_deref(), Some("disk full"));
        assert!(req.duration_ms.is_none());
    }

    #[test]
    fn test_publish_without_subscriber_is_noop() {
        let bus = EventBus::new();
        // must not panic or block
        bus.publish_toast(ToastRequest::info("hello"));
    }
}
