use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::detection::Detector;
use crate::error::{FailureKind, RedactionError};
use crate::models::{Detection, EncodedImage};
use crate::pipeline::RedactionEngine;
use crate::queue::{ItemId, ItemState, Queue, QueueEvent, StatusKind};

/// Drives single queue items through detection and redaction.
///
/// PENDING/ERROR -> DETECTING -> BLURRING -> COMPLETED, with any failure
/// ending in ERROR. Every transition is written to the queue and announced
/// as it happens.
pub struct ItemProcessor<D> {
    queue: Queue,
    detector: Arc<D>,
    engine: Arc<RedactionEngine>,
}

impl<D> Clone for ItemProcessor<D> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            detector: self.detector.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<D: Detector + 'static> ItemProcessor<D> {
    pub fn new(queue: Queue, detector: Arc<D>, engine: RedactionEngine) -> Self {
        Self {
            queue,
            detector,
            engine: Arc::new(engine),
        }
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Run one item to a terminal state.
    ///
    /// Returns the final status, or `None` when nothing was done: unknown id,
    /// item already completed, item already being processed, or item removed
    /// before its result could be stored.
    pub async fn process(&self, id: ItemId) -> Option<StatusKind> {
        let original = self.claim(id).await?;
        info!(%id, "processing started");

        let outcome = self.run(id, &original).await;
        let status = outcome.kind();
        if !self.queue.transition(id, outcome).await {
            debug!(%id, "item removed while processing, result dropped");
            return None;
        }

        info!(%id, ?status, "processing finished");
        Some(status)
    }

    /// Move an eligible item into DETECTING and hand back its source image.
    /// Check and transition happen under one lock so an item is never run twice at once.
    async fn claim(&self, id: ItemId) -> Option<EncodedImage> {
        let original = self
            .queue
            .update(id, |item| {
                if !item.status().is_eligible() {
                    return None;
                }
                item.state = ItemState::Detecting;
                Some(item.original().clone())
            })
            .await
            .flatten();

        match &original {
            Some(_) => self.queue.emit(QueueEvent::StatusChanged {
                id,
                status: StatusKind::Detecting,
            }),
            None => debug!(%id, "item missing or not eligible, skipping"),
        }
        original
    }

    async fn run(&self, id: ItemId, original: &EncodedImage) -> ItemState {
        let detections = match self.detector.detect(original).await {
            Ok(detections) => detections,
            Err(err) => {
                warn!(%id, error = %err, "detection failed");
                return ItemState::Failed {
                    kind: FailureKind::Failed,
                };
            }
        };

        if detections.is_empty() {
            info!(%id, "no plates found");
            return ItemState::Failed {
                kind: FailureKind::NotFound,
            };
        }

        self.queue
            .transition(
                id,
                ItemState::Blurring {
                    detections: detections.len(),
                },
            )
            .await;

        match self.redact(original.clone(), detections).await {
            Ok(processed) => ItemState::Completed {
                processed,
                completed_at: OffsetDateTime::now_utc(),
            },
            Err(err) => {
                warn!(%id, error = %err, "redaction failed");
                ItemState::Failed {
                    kind: FailureKind::Failed,
                }
            }
        }
    }

    /// Pixel work runs on the blocking pool
    async fn redact(
        &self,
        image: EncodedImage,
        detections: Vec<Detection>,
    ) -> Result<EncodedImage, RedactionError> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.redact(&image, &detections))
            .await
            .map_err(|e| RedactionError::Aborted(e.to_string()))?
    }
}
