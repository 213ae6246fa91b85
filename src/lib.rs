pub mod config;
pub mod detection;
pub mod error;
pub mod export;
pub mod filters;
pub mod intake;
pub mod models;
pub mod pipeline;
pub mod queue;

pub use config::{DetectorConfig, ExportConfig, RedactionConfig};
pub use detection::{Detector, DetectorError, GeminiDetector};
pub use error::{FailureKind, RedactionError};
pub use models::{Detection, EncodedImage, NormalizedBox, PixelRect};
pub use pipeline::{RedactionEngine, RegionContext, RegionFilter};
pub use queue::{
    BatchCoordinator, BatchFlag, BatchReport, ItemId, ItemProcessor, ItemState, Progress, Queue,
    QueueEvent, QueueItem, StatusKind,
};
