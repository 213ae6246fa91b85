use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info};

use crate::detection::Detector;
use crate::queue::{ItemProcessor, Queue, QueueEvent, StatusKind};

/// Outcome of one `process_all` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Items that were actually run
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Set when the call returned immediately because a batch was already running
    pub already_running: bool,
}

impl BatchReport {
    fn already_running() -> Self {
        Self {
            already_running: true,
            ..Self::default()
        }
    }
}

/// Read-only handle on the "batch in progress" flag
#[derive(Debug, Clone)]
pub struct BatchFlag(Arc<AtomicBool>);

impl BatchFlag {
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Holds the in-progress flag for the lifetime of a run, clearing it on every exit path
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Processes every eligible item of a queue, strictly one after another.
///
/// Only one item is ever in detection or redaction at a time, which keeps
/// load on a rate-limited detector bounded.
pub struct BatchCoordinator<D> {
    processor: ItemProcessor<D>,
    running: Arc<AtomicBool>,
}

impl<D: Detector + 'static> BatchCoordinator<D> {
    pub fn new(processor: ItemProcessor<D>) -> Self {
        Self {
            processor,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn processor(&self) -> &ItemProcessor<D> {
        &self.processor
    }

    pub fn queue(&self) -> &Queue {
        self.processor.queue()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Handle for observers (e.g. a UI disabling its start button)
    pub fn flag(&self) -> BatchFlag {
        BatchFlag(self.running.clone())
    }

    /// Process all PENDING and ERROR items in queue order.
    ///
    /// The set of items is fixed when the run starts. A failing item never
    /// stops the run. Calling this while a run is active returns at once.
    pub async fn process_all(&self) -> BatchReport {
        let queue = self.queue();
        let report = {
            let Some(_guard) = RunGuard::acquire(&self.running) else {
                debug!("batch already running, ignoring trigger");
                return BatchReport::already_running();
            };

            let ids = queue.ids_where(|item| item.status().is_eligible()).await;
            info!(total = ids.len(), "batch started");
            queue.emit(QueueEvent::BatchStarted { total: ids.len() });

            let mut report = BatchReport::default();
            for id in ids {
                match self.processor.process(id).await {
                    Some(StatusKind::Completed) => report.completed += 1,
                    Some(StatusKind::Error) => report.failed += 1,
                    Some(_) => {}
                    None => continue,
                }
                report.processed += 1;
            }
            report
        };

        // Flag is already clear when observers hear about the finish
        info!(
            processed = report.processed,
            completed = report.completed,
            failed = report.failed,
            "batch finished"
        );
        queue.emit(QueueEvent::BatchFinished { report });
        report
    }
}
