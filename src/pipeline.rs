use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

use crate::config::RedactionConfig;
use crate::error::RedactionError;
use crate::filters::{self, PixelateFilter, SoftenFilter};
use crate::models::{Detection, EncodedImage, PixelRect};

/// Context available to all region filters
#[derive(Debug, Clone, Copy)]
pub struct RegionContext {
    /// Position of the detection in the input list
    pub index: usize,
    /// Padded, clamped rectangle being processed
    pub rect: PixelRect,
    pub image_width: u32,
    pub image_height: u32,
}

/// Trait that all region filters must implement
pub trait RegionFilter: Send + Sync {
    /// Transform the pixels of one redaction region.
    /// The returned buffer must have the same dimensions as the input.
    fn apply(&self, region: RgbaImage, context: &RegionContext) -> RgbaImage;

    /// Human-readable name for this filter (used in logs)
    fn name(&self) -> &str;
}

/// Composable redaction engine.
///
/// Holds no per-image state: every call works on its own copy of the source
/// raster and a fresh scratch buffer per region.
pub struct RedactionEngine {
    filters: Vec<Arc<dyn RegionFilter>>,
    padding_ratio: f64,
    jpeg_quality: u8,
}

impl RedactionEngine {
    /// Create an engine with no filters
    pub fn new() -> Self {
        let defaults = RedactionConfig::default();
        Self {
            filters: Vec::new(),
            padding_ratio: defaults.padding_ratio,
            jpeg_quality: defaults.jpeg_quality,
        }
    }

    /// Standard pixelate-then-soften engine built from `config`
    pub fn from_config(config: &RedactionConfig) -> Self {
        Self::new()
            .with_padding(config.padding_ratio)
            .with_quality(config.jpeg_quality)
            .add_filter(Arc::new(PixelateFilter {
                scale: config.pixel_scale,
            }))
            .add_filter(Arc::new(SoftenFilter {
                sigma: config.blur_sigma,
                brightness: config.brightness,
            }))
    }

    pub fn with_padding(mut self, padding_ratio: f64) -> Self {
        self.padding_ratio = padding_ratio;
        self
    }

    pub fn with_quality(mut self, jpeg_quality: u8) -> Self {
        self.jpeg_quality = jpeg_quality.clamp(1, 100);
        self
    }

    /// Add a filter; filters run in insertion order on every region
    pub fn add_filter(mut self, filter: Arc<dyn RegionFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Helper method to add a filter from a Box (for convenience)
    pub fn add_filter_boxed(mut self, filter: Box<dyn RegionFilter>) -> Self {
        self.filters.push(Arc::from(filter));
        self
    }

    /// Redaction rectangles for an image of the given size, one per detection.
    /// `None` marks detections that cover no pixel of the image.
    pub fn regions(&self, width: u32, height: u32, detections: &[Detection]) -> Vec<Option<PixelRect>> {
        detections
            .iter()
            .map(|det| det.bbox.region(width, height, self.padding_ratio))
            .collect()
    }

    /// Raster stage: returns a new buffer with every detected region obscured.
    ///
    /// Detections are applied in input order, so a later region sees the
    /// pixels an earlier overlapping one has already painted. Pixels outside
    /// every region are copied unchanged.
    pub fn apply(&self, image: &DynamicImage, detections: &[Detection]) -> RgbaImage {
        let mut canvas = image.to_rgba8();
        let (width, height) = canvas.dimensions();

        for (index, rect) in self.regions(width, height, detections).into_iter().enumerate() {
            let Some(rect) = rect else {
                debug!(index, label = %detections[index].label, "detection covers no pixels, skipping");
                continue;
            };

            let context = RegionContext {
                index,
                rect,
                image_width: width,
                image_height: height,
            };

            let mut region = filters::extract_region(&canvas, rect);
            for filter in &self.filters {
                region = filter.apply(region, &context);
                if region.dimensions() != (rect.width, rect.height) {
                    // A misbehaving filter must not paint outside its rectangle
                    region = image::imageops::resize(
                        &region,
                        rect.width,
                        rect.height,
                        image::imageops::FilterType::Nearest,
                    );
                }
            }
            filters::paste_region(&mut canvas, &region, rect);

            debug!(
                index,
                x = rect.x,
                y = rect.y,
                width = rect.width,
                height = rect.height,
                "region redacted"
            );
        }

        canvas
    }

    /// Decode, redact and re-encode as lossy JPEG.
    ///
    /// When no detection covers any pixel the source is returned as is,
    /// without a lossy round trip.
    pub fn redact(&self, source: &EncodedImage, detections: &[Detection]) -> Result<EncodedImage, RedactionError> {
        let image = source
            .decode()
            .map_err(|e| RedactionError::Decode(e.to_string()))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(RedactionError::ZeroDimensions);
        }

        let regions = self.regions(image.width(), image.height(), detections);
        if regions.iter().all(Option::is_none) {
            debug!(detections = detections.len(), "nothing to redact, keeping source");
            return Ok(source.clone());
        }

        let redacted = self.apply(&image, detections);
        let data = encode_jpeg(redacted, self.jpeg_quality)?;
        Ok(EncodedImage::new(data, ImageFormat::Jpeg))
    }
}

impl Default for RedactionEngine {
    fn default() -> Self {
        Self::from_config(&RedactionConfig::default())
    }
}

/// Encode as baseline JPEG; alpha is dropped
pub fn encode_jpeg(image: RgbaImage, quality: u8) -> Result<Vec<u8>, RedactionError> {
    let rgb = DynamicImage::ImageRgba8(image).to_rgb8();
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| RedactionError::Encode(e.to_string()))?;
    Ok(out)
}
