pub mod gemini;
pub mod response;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::models::{Detection, EncodedImage};

pub use gemini::GeminiDetector;
pub use response::parse_detections;

/// Why a detector call produced no usable result
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("detector returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed detector response: {0}")]
    MalformedResponse(String),
}

/// Pluggable license plate detector.
///
/// Takes the still-encoded image and returns boxes in normalized
/// `[0, 1000]` coordinates, possibly none.
pub trait Detector: Send + Sync {
    fn detect(
        &self,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<Vec<Detection>, DetectorError>> + Send;
}

impl<D: Detector> Detector for Arc<D> {
    fn detect(
        &self,
        image: &EncodedImage,
    ) -> impl Future<Output = Result<Vec<Detection>, DetectorError>> + Send {
        (**self).detect(image)
    }
}
