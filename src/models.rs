use std::sync::Arc;

use image::{DynamicImage, ImageFormat, ImageResult};
use serde::{Deserialize, Serialize};

/// Detector coordinates are proportions of the image side scaled by this value.
pub const NORMALIZED_SCALE: f64 = 1000.0;

/// Absorbs float noise so an exact pixel edge never grows the rectangle by one.
const EDGE_EPSILON: f64 = 1e-6;

/// Bounding box in normalized coordinates, `[y_min, x_min, y_max, x_max]` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct NormalizedBox {
    pub y_min: f64,
    pub x_min: f64,
    pub y_max: f64,
    pub x_max: f64,
}

impl From<[f64; 4]> for NormalizedBox {
    fn from([y_min, x_min, y_max, x_max]: [f64; 4]) -> Self {
        Self { y_min, x_min, y_max, x_max }
    }
}

impl From<NormalizedBox> for [f64; 4] {
    fn from(b: NormalizedBox) -> Self {
        [b.y_min, b.x_min, b.y_max, b.x_max]
    }
}

impl NormalizedBox {
    /// Unpadded rectangle in pixel units for an image of the given size.
    ///
    /// Inverted boxes collapse to zero width/height instead of going negative.
    pub fn to_pixels(&self, width: u32, height: u32) -> RectF {
        let (w, h) = (width as f64, height as f64);
        RectF {
            x: self.x_min * w / NORMALIZED_SCALE,
            y: self.y_min * h / NORMALIZED_SCALE,
            width: ((self.x_max - self.x_min) * w / NORMALIZED_SCALE).max(0.0),
            height: ((self.y_max - self.y_min) * h / NORMALIZED_SCALE).max(0.0),
        }
    }

    /// Padded, clamped redaction region, or `None` when nothing of it lies inside the image
    pub fn region(&self, width: u32, height: u32, padding_ratio: f64) -> Option<PixelRect> {
        self.to_pixels(width, height)
            .pad(padding_ratio)
            .clamp_to(width, height)
    }
}

/// One license plate candidate reported by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box_2d")]
    pub bbox: NormalizedBox,
    pub label: String,
}

impl Detection {
    pub fn new(box_2d: [f64; 4], label: impl Into<String>) -> Self {
        Self {
            bbox: box_2d.into(),
            label: label.into(),
        }
    }
}

/// Rectangle in (possibly fractional) pixel units, before rasterisation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectF {
    /// Grow the rectangle by `ratio` of its own width/height on every side
    pub fn pad(&self, ratio: f64) -> Self {
        let pad_x = self.width * ratio;
        let pad_y = self.height * ratio;
        Self {
            x: self.x - pad_x,
            y: self.y - pad_y,
            width: self.width + 2.0 * pad_x,
            height: self.height + 2.0 * pad_y,
        }
    }

    /// Intersect with `[0,width) x [0,height)` and snap outwards to whole pixels.
    ///
    /// Returns `None` for empty intersections (degenerate or off-image boxes, NaN input).
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelRect> {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return None;
        }

        let x0 = (self.x + EDGE_EPSILON).floor().max(0.0);
        let y0 = (self.y + EDGE_EPSILON).floor().max(0.0);
        let x1 = (self.x + self.width - EDGE_EPSILON).ceil().min(width as f64);
        let y1 = (self.y + self.height - EDGE_EPSILON).ceil().min(height as f64);

        if !(x1 > x0 && y1 > y0) {
            return None;
        }

        Some(PixelRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Redaction region in pixel space, always inside the image it was computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn contains_rect(&self, other: &PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Encoded image bytes plus their detected container format.
///
/// Cloning shares the underlying buffer, the bytes themselves are never mutated.
#[derive(Clone)]
pub struct EncodedImage {
    data: Arc<[u8]>,
    format: ImageFormat,
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

impl EncodedImage {
    pub fn new(data: impl Into<Arc<[u8]>>, format: ImageFormat) -> Self {
        Self {
            data: data.into(),
            format,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn decode(&self) -> ImageResult<DynamicImage> {
        image::load_from_memory_with_format(&self.data, self.format)
    }
}
