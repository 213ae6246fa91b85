use serde::Serialize;

use crate::queue::{BatchReport, ItemId, StatusKind};

/// Notification published on every observable queue change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    ItemAdded { id: ItemId, file_name: String },
    ItemRemoved { id: ItemId },
    /// Emitted once per state transition, including the intermediate ones
    StatusChanged { id: ItemId, status: StatusKind },
    BatchStarted { total: usize },
    BatchFinished { report: BatchReport },
}
