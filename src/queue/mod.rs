pub mod batch;
pub mod events;
pub mod machine;

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::error::FailureKind;
use crate::models::EncodedImage;

pub use batch::{BatchCoordinator, BatchFlag, BatchReport};
pub use events::QueueEvent;
pub use machine::ItemProcessor;

/// Opaque, unique queue item identifier
pub type ItemId = Uuid;

/// Capacity of the event channel; slow subscribers lag instead of blocking
const EVENT_CAPACITY: usize = 256;

/// Tag of an item's state, cheap to copy and compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusKind {
    Pending,
    Detecting,
    Blurring,
    Completed,
    Error,
}

impl StatusKind {
    /// Whether a batch run should pick the item up
    pub fn is_eligible(self) -> bool {
        matches!(self, StatusKind::Pending | StatusKind::Error)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, StatusKind::Detecting | StatusKind::Blurring)
    }
}

/// Processing state of one item, with the data valid in that state
#[derive(Debug, Clone)]
pub enum ItemState {
    Pending,
    Detecting,
    Blurring {
        detections: usize,
    },
    Completed {
        processed: EncodedImage,
        completed_at: OffsetDateTime,
    },
    Failed {
        kind: FailureKind,
    },
}

impl ItemState {
    pub fn kind(&self) -> StatusKind {
        match self {
            ItemState::Pending => StatusKind::Pending,
            ItemState::Detecting => StatusKind::Detecting,
            ItemState::Blurring { .. } => StatusKind::Blurring,
            ItemState::Completed { .. } => StatusKind::Completed,
            ItemState::Failed { .. } => StatusKind::Error,
        }
    }
}

/// One submitted image and its processing lifecycle
#[derive(Debug, Clone)]
pub struct QueueItem {
    id: ItemId,
    file_name: String,
    original: EncodedImage,
    state: ItemState,
}

impl QueueItem {
    /// New pending item with a fresh id
    pub fn new(file_name: impl Into<String>, original: EncodedImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            original,
            state: ItemState::Pending,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The submitted image, never modified by processing
    pub fn original(&self) -> &EncodedImage {
        &self.original
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn status(&self) -> StatusKind {
        self.state.kind()
    }

    pub fn processed_image(&self) -> Option<&EncodedImage> {
        match &self.state {
            ItemState::Completed { processed, .. } => Some(processed),
            _ => None,
        }
    }

    pub fn completed_at(&self) -> Option<OffsetDateTime> {
        match &self.state {
            ItemState::Completed { completed_at, .. } => Some(*completed_at),
            _ => None,
        }
    }

    /// User-facing error message, set only in the error state
    pub fn error(&self) -> Option<&'static str> {
        match &self.state {
            ItemState::Failed { kind } => Some(kind.message()),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match &self.state {
            ItemState::Failed { kind } => Some(*kind),
            _ => None,
        }
    }
}

/// Completed vs. total items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completion percentage, 0 for an empty queue
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}

/// Shared, ordered collection of queue items.
///
/// Cloning gives another handle to the same queue. All mutations are keyed
/// by item id and touch only that item; updates for ids that are no longer
/// present are ignored.
#[derive(Debug, Clone)]
pub struct Queue {
    items: Arc<RwLock<Vec<QueueItem>>>,
    events: broadcast::Sender<QueueEvent>,
}

impl Queue {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            events,
        }
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: QueueEvent) {
        // Err only means nobody is listening
        let _ = self.events.send(event);
    }

    /// Append an item at the end of the queue
    pub async fn push(&self, item: QueueItem) -> ItemId {
        let id = item.id();
        let file_name = item.file_name().to_string();
        self.items.write().await.push(item);
        self.emit(QueueEvent::ItemAdded { id, file_name });
        id
    }

    /// Enqueue a new pending item
    pub async fn add(&self, file_name: impl Into<String>, original: EncodedImage) -> ItemId {
        self.push(QueueItem::new(file_name, original)).await
    }

    /// Drop an item; in-flight work for it finishes but its updates are discarded
    pub async fn remove(&self, id: ItemId) -> Option<QueueItem> {
        let removed = {
            let mut items = self.items.write().await;
            let pos = items.iter().position(|item| item.id == id)?;
            items.remove(pos)
        };
        self.emit(QueueEvent::ItemRemoved { id });
        Some(removed)
    }

    pub async fn get(&self, id: ItemId) -> Option<QueueItem> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Copy of all items in queue order
    pub async fn snapshot(&self) -> Vec<QueueItem> {
        self.items.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Ids of the matching items, in queue order
    pub async fn ids_where(&self, predicate: impl Fn(&QueueItem) -> bool) -> Vec<ItemId> {
        self.items
            .read()
            .await
            .iter()
            .filter(|item| predicate(item))
            .map(|item| item.id)
            .collect()
    }

    /// Run `f` on one item under the write lock.
    ///
    /// Returns `None` without calling `f` when the id is unknown.
    pub async fn update<R>(&self, id: ItemId, f: impl FnOnce(&mut QueueItem) -> R) -> Option<R> {
        let mut items = self.items.write().await;
        items.iter_mut().find(|item| item.id == id).map(f)
    }

    /// Replace an item's state and announce it. `false` if the item is gone.
    pub(crate) async fn transition(&self, id: ItemId, state: ItemState) -> bool {
        let status = state.kind();
        let applied = self.update(id, |item| item.state = state).await.is_some();
        if applied {
            self.emit(QueueEvent::StatusChanged { id, status });
        }
        applied
    }

    pub async fn progress(&self) -> Progress {
        let items = self.items.read().await;
        Progress {
            completed: items
                .iter()
                .filter(|item| item.status() == StatusKind::Completed)
                .count(),
            total: items.len(),
        }
    }

    /// Completed items, in queue order
    pub async fn completed(&self) -> Vec<QueueItem> {
        self.items
            .read()
            .await
            .iter()
            .filter(|item| item.status() == StatusKind::Completed)
            .cloned()
            .collect()
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn dummy_image() -> EncodedImage {
        EncodedImage::new(vec![0u8; 4], ImageFormat::Png)
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_noop() {
        let queue = Queue::new();
        queue.add("a.png", dummy_image()).await;

        let touched = queue.update(Uuid::new_v4(), |_| ()).await;
        assert!(touched.is_none());
        assert!(!queue.transition(Uuid::new_v4(), ItemState::Detecting).await);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn transition_only_touches_target_item() {
        let queue = Queue::new();
        let a = queue.add("a.png", dummy_image()).await;
        let b = queue.add("b.png", dummy_image()).await;

        assert!(queue.transition(b, ItemState::Failed { kind: FailureKind::NotFound }).await);

        let items = queue.snapshot().await;
        assert_eq!(items[0].id(), a);
        assert_eq!(items[0].status(), StatusKind::Pending);
        assert_eq!(items[1].error(), Some("Not found"));
        assert!(items[1].processed_image().is_none());
    }

    #[tokio::test]
    async fn events_follow_mutations() {
        let queue = Queue::new();
        let mut rx = queue.subscribe();

        let id = queue.add("a.png", dummy_image()).await;
        queue.transition(id, ItemState::Detecting).await;
        queue.remove(id).await;

        assert_eq!(
            rx.try_recv().unwrap(),
            QueueEvent::ItemAdded { id, file_name: "a.png".to_string() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            QueueEvent::StatusChanged { id, status: StatusKind::Detecting }
        );
        assert_eq!(rx.try_recv().unwrap(), QueueEvent::ItemRemoved { id });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn progress_counts_completed_items() {
        let queue = Queue::new();
        assert_eq!(queue.progress().await.percent(), 0.0);

        let a = queue.add("a.png", dummy_image()).await;
        queue.add("b.png", dummy_image()).await;
        queue
            .transition(
                a,
                ItemState::Completed {
                    processed: dummy_image(),
                    completed_at: OffsetDateTime::now_utc(),
                },
            )
            .await;

        let progress = queue.progress().await;
        assert_eq!(progress, Progress { completed: 1, total: 2 });
        assert_eq!(progress.percent(), 50.0);
        assert_eq!(queue.completed().await.len(), 1);
    }
}
