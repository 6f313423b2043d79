//! Bounded, self-expiring toast notifications.
//!
//! The queue holds at most `TOAST_CAPACITY` toasts; publishing past
//! capacity evicts the oldest entry and cancels its expiry timer. A
//! `ToastHost` task bridges the process-wide broadcast channel to the
//! queue so producers never hold the queue itself.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::constants::{DEFAULT_TOAST_DURATION_MS, TOAST_CAPACITY};
use crate::events::{EventBus, ToastRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Info,
    Success,
    Error,
}

impl ToastVariant {
    pub fn icon(&self) -> &'static str {
        match self {
            ToastVariant::Info => "ℹ",
            ToastVariant::Success => "✓",
            ToastVariant::Error => "✗",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
    /// Non-positive means persist until dismissed
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

/// Ordered bounded toast store. Owns every expiry timer; no other
/// component may cancel a timer directly.
pub struct ToastQueue {
    toasts: VecDeque<Toast>,
    timers: HashMap<String, AbortHandle>,
    expiry_tx: mpsc::UnboundedSender<String>,
}

impl ToastQueue {
    /// Returns the queue and the receiver on which expired (or
    /// externally dismissed) toast ids arrive.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        (
            Self {
                toasts: VecDeque::new(),
                timers: HashMap::new(),
                expiry_tx,
            },
            expiry_rx,
        )
    }

    /// Sender that routes an id into the dismiss path; used for
    /// explicit user dismissal from the viewport.
    pub fn dismiss_sender(&self) -> mpsc::UnboundedSender<String> {
        self.expiry_tx.clone()
    }

    /// Enqueue a toast. Requests without a title are dropped. Returns
    /// the synthesized id on acceptance.
    pub fn publish(&mut self, request: ToastRequest) -> Option<String> {
        let title = request.title.trim();
        if title.is_empty() {
            tracing::debug!("dropping toast request with empty title");
            return None;
        }

        let toast = Toast {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: request.description,
            variant: request.variant.unwrap_or(ToastVariant::Info),
            duration_ms: request.duration_ms.unwrap_or(DEFAULT_TOAST_DURATION_MS),
            created_at: Utc::now(),
        };
        let id = toast.id.clone();
        let duration_ms = toast.duration_ms;
        self.toasts.push_back(toast);

        if self.toasts.len() > TOAST_CAPACITY {
            if let Some(evicted) = self.toasts.pop_front() {
                if let Some(timer) = self.timers.remove(&evicted.id) {
                    timer.abort();
                }
            }
        }

        if duration_ms > 0 {
            let expiry_tx = self.expiry_tx.clone();
            let expired_id = id.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(duration_ms as u64)).await;
                let _ = expiry_tx.send(expired_id);
            });
            self.timers.insert(id.clone(), handle.abort_handle());
        }

        Some(id)
    }

    /// Remove a toast by id and cancel its pending timer. Dismissing an
    /// id that is already gone is a no-op.
    pub fn dismiss(&mut self, id: &str) {
        self.toasts.retain(|toast| toast.id != id);
        if let Some(timer) = self.timers.remove(id) {
            timer.abort();
        }
    }

    pub fn toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Toast> {
        self.toasts.iter().cloned().collect()
    }

    /// Cancel all outstanding timers. Called at viewport teardown so no
    /// timer fires into a dead consumer.
    pub fn shutdown(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        self.toasts.clear();
    }
}

/// Task driving the queue: applies published requests and expiries,
/// pushing a fresh snapshot to the rendering side after each change.
pub struct ToastHost {
    queue: ToastQueue,
    expiry_rx: mpsc::UnboundedReceiver<String>,
    requests: broadcast::Receiver<ToastRequest>,
    snapshot_tx: watch::Sender<Vec<Toast>>,
    cancel: CancellationToken,
}

impl ToastHost {
    pub fn new(bus: &EventBus, cancel: CancellationToken) -> (Self, watch::Receiver<Vec<Toast>>) {
        let (queue, expiry_rx) = ToastQueue::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
        (
            Self {
                queue,
                expiry_rx,
                requests: bus.subscribe_toasts(),
                snapshot_tx,
                cancel,
            },
            snapshot_rx,
        )
    }

    /// Sender for explicit user dismissal by toast id.
    pub fn dismiss_sender(&self) -> mpsc::UnboundedSender<String> {
        self.queue.dismiss_sender()
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                request = self.requests.recv() => match request {
                    Ok(request) => {
                        self.queue.publish(request);
                        self.publish_snapshot();
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "toast viewport lagged behind publishers");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(id) = self.expiry_rx.recv() => {
                    self.queue.dismiss(&id);
                    self.publish_snapshot();
                }
            }
        }
        self.queue.shutdown();
    }

    fn publish_snapshot(&self) {
        let _ = self.snapshot_tx.send(self.queue.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_applies_defaults() {
        let (mut queue, _expiry_rx) = ToastQueue::new();
        let id = queue
            .publish(ToastRequest {
                title: "Saved".to_string(),
                description: None,
                variant: None,
                duration_ms: None,
            })
            .unwrap();

        let toast = queue.toasts().next().unwrap();
        assert_eq!(toast.id, id);
        assert_eq!(toast.variant, ToastVariant::Info);
        assert_eq!(toast.duration_ms, DEFAULT_TOAST_DURATION_MS);
    }

    #[tokio::test]
    async fn test_untitled_request_rejected() {
        let (mut queue, _expiry_rx) = ToastQueue::new();
        assert!(queue.publish(ToastRequest::info("")).is_none());
        assert!(queue.publish(ToastRequest::info("   ")).is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let (mut queue, _expiry_rx) = ToastQueue::new();
        for i in 1..=5 {
            queue.publish(ToastRequest::info(format!("toast {}", i)));
        }
        assert_eq!(queue.len(), TOAST_CAPACITY);
        let titles: Vec<&str> = queue.toasts().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["toast 2", "toast 3", "toast 4", "toast 5"]);
    }

    #[tokio::test]
    async fn test_dismiss_is_idempotent() {
        let (mut queue, _expiry_rx) = ToastQueue::new();
        let id = queue.publish(ToastRequest::info("once")).unwrap();
        queue.dismiss(&id);
        assert!(queue.is_empty());
        queue.dismiss(&id);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_reports_expiry() {
        let (mut queue, mut expiry_rx) = ToastQueue::new();
        let id = queue
            .publish(ToastRequest::info("transient").with_duration_ms(100))
            .unwrap();

        // paused clock auto-advances to the timer deadline
        let expired = expiry_rx.recv().await.unwrap();
        assert_eq!(expired, id);

        queue.dismiss(&expired);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_duration_persists() {
        let (mut queue, mut expiry_rx) = ToastQueue::new();
        queue.publish(ToastRequest::info("sticky").with_duration_ms(0));

        tokio::time::advance(Duration::from_millis(60_000)).await;
        assert!(expiry_rx.try_recv().is_err());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_cancels_timer() {
        let (mut queue, mut expiry_rx) = ToastQueue::new();
        let first = queue.publish(ToastRequest::info("toast 1")).unwrap();
        for i in 2..=5 {
            queue.publish(ToastRequest::info(format!("toast {}", i)));
        }

        // the evicted toast's timer was aborted; only the surviving four fire
        let mut expired = Vec::new();
        for _ in 0..4 {
            expired.push(expiry_rx.recv().await.unwrap());
        }
        assert!(!expired.contains(&first));
        assert!(expiry_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_clears_everything() {
        let (mut queue, _expiry_rx) = ToastQueue::new();
        queue.publish(ToastRequest::info("one"));
        queue.publish(ToastRequest::info("two"));
        queue.shutdown();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_host_applies_bus_requests() {
        let bus = EventBus::new();
        let cancel = CancellationToken::new();
        let (host, mut snapshot_rx) = ToastHost::new(&bus, cancel.clone());
        let handle = tokio::spawn(host.run());

        bus.publish_toast(ToastRequest::success("Memory saved"));
        snapshot_rx.changed().await.unwrap();
        {
            let snapshot = snapshot_rx.borrow();
            assert_eq!(snapshot.len(), 1);
            assert_eq!(snapshot[0].title, "Memory saved");
        }

        cancel.cancel();
        handle.await.unwrap();
    }
}
