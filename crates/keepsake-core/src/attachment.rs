//! Local attachment previews.
//!
//! A selected file is rendered before upload through a revocable
//! `PreviewHandle` allocated from the process-wide `PreviewRegistry`.
//! The selector that allocated a handle owns it until it is sent or
//! removed; everything it ever allocated is revoked exactly once at
//! teardown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::events::{EventBus, ToastRequest};

/// Revocable reference to a selected file, good for rendering until the
/// registry entry is revoked.
#[derive(Debug, Clone)]
pub struct PreviewHandle {
    pub id: Uuid,
    pub path: PathBuf,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Open-handles registry. Injected where needed rather than kept as an
/// ambient global; revocation is idempotent.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<HashMap<Uuid, PreviewHandle>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self, path: &Path, content_type: &str) -> PreviewHandle {
        let handle = PreviewHandle {
            id: Uuid::new_v4(),
            path: path.to_path_buf(),
            content_type: content_type.to_string(),
            created_at: Utc::now(),
        };
        self.inner.lock().insert(handle.id, handle.clone());
        handle
    }

    /// Returns true if the handle was still open.
    pub fn revoke(&self, id: Uuid) -> bool {
        self.inner.lock().remove(&id).is_some()
    }

    pub fn is_open(&self, id: Uuid) -> bool {
        self.inner.lock().contains_key(&id)
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().len()
    }
}

/// What to do when a selected file is rejected for its content type.
/// The silent default matches the product's observed behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectionFeedback {
    #[default]
    Silent,
    Toast,
}

/// Per-controller attachment selection. At most one pending attachment;
/// selecting a new file replaces the reference without revoking the old
/// handle (the controller decides when previews die).
pub struct AttachmentSelector {
    registry: PreviewRegistry,
    bus: EventBus,
    feedback: RejectionFeedback,
    current: Option<PreviewHandle>,
    allocated: Vec<Uuid>,
}

impl AttachmentSelector {
    pub fn new(registry: PreviewRegistry, bus: EventBus) -> Self {
        Self {
            registry,
            bus,
            feedback: RejectionFeedback::default(),
            current: None,
            allocated: Vec::new(),
        }
    }

    pub fn set_feedback(&mut self, feedback: RejectionFeedback) {
        self.feedback = feedback;
    }

    /// Select a file for attachment. Only image content types are
    /// accepted; anything else leaves the current selection unchanged.
    pub fn select(&mut self, path: &Path, content_type: &str) {
        if !content_type.starts_with("image/") {
            tracing::debug!(content_type, "rejecting non-image attachment");
            if self.feedback == RejectionFeedback::Toast {
                self.bus.publish_toast(
                    ToastRequest::error("Unsupported attachment")
                        .with_description("Only images can be attached to a message."),
                );
            }
            return;
        }
        let handle = self.registry.allocate(path, content_type);
        self.allocated.push(handle.id);
        self.current = Some(handle);
    }

    /// Revoke and clear the pending selection, if any.
    pub fn remove(&mut self) {
        if let Some(handle) = self.current.take() {
            self.registry.revoke(handle.id);
        }
    }

    /// Hand the pending selection to an outgoing message. The handle
    /// stays open for display; it is revoked at teardown.
    pub fn take(&mut self) -> Option<PreviewHandle> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&PreviewHandle> {
        self.current.as_ref()
    }

    /// Revoke every handle this selector ever allocated. Safe to call
    /// more than once; already-revoked handles are skipped by the
    /// registry.
    pub fn teardown(&mut self) {
        self.current = None;
        for id in self.allocated.drain(..) {
            self.registry.revoke(id);
        }
    }
}

impl Drop for AttachmentSelector {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Best-effort content type from a file extension, for shells that
/// select by path rather than by a typed file object.
pub fn content_type_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> (AttachmentSelector, PreviewRegistry) {
        let registry = PreviewRegistry::new();
        let bus = EventBus::new();
        (AttachmentSelector::new(registry.clone(), bus), registry)
    }

    #[test]
    fn test_select_accepts_images_only() {
        let (mut selector, registry) = selector();
        selector.select(Path::new("trip.pdf"), "application/pdf");
        assert!(selector.current().is_none());
        assert_eq!(registry.open_count(), 0);

        selector.select(Path::new("trip.jpg"), "image/jpeg");
        assert!(selector.current().is_some());
        assert_eq!(registry.open_count(), 1);
    }

    #[test]
    fn test_rejected_type_keeps_prior_selection() {
        let (mut selector, _registry) = selector();
        selector.select(Path::new("kyoto.png"), "image/png");
        let kept = selector.current().unwrap().id;

        selector.select(Path::new("notes.txt"), "text/plain");
        assert_eq!(selector.current().unwrap().id, kept);
    }

    #[test]
    fn test_replacement_does_not_revoke_previous() {
        let (mut selector, registry) = selector();
        selector.select(Path::new("a.png"), "image/png");
        let first = selector.current().unwrap().id;
        selector.select(Path::new("b.png"), "image/png");

        // the old handle is replaced, not revoked
        assert!(registry.is_open(first));
        assert_eq!(registry.open_count(), 2);
    }

    #[test]
    fn test_remove_revokes_current() {
        let (mut selector, registry) = selector();
        selector.select(Path::new("a.png"), "image/png");
        let id = selector.current().unwrap().id;

        selector.remove();
        assert!(selector.current().is_none());
        assert!(!registry.is_open(id));
    }

    #[test]
    fn test_teardown_revokes_all_once() {
        let (mut selector, registry) = selector();
        selector.select(Path::new("a.png"), "image/png");
        selector.select(Path::new("b.png"), "image/png");
        let sent = selector.take();
        assert!(sent.is_some());
        assert_eq!(registry.open_count(), 2);

        selector.teardown();
        assert_eq!(registry.open_count(), 0);

        // a second teardown has nothing left to revoke
        selector.teardown();
        assert_eq!(registry.open_count(), 0);
    }

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("x.JPG")), "image/jpeg");
        assert_eq!(content_type_for_path(Path::new("x.webp")), "image/webp");
        assert_eq!(
            content_type_for_path(Path::new("x.doc")),
            "application/octet-stream"
        );
    }
}
