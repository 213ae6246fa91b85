mod fixtures;
#[allow(unused_imports)]
pub use fixtures::*;

// Re-export commonly used types from plateblur for tests
#[allow(unused_imports)]
pub use plateblur::{
    BatchCoordinator, Detection, DetectorError, EncodedImage, ItemState, Queue, QueueEvent,
    RedactionEngine, StatusKind,
};
