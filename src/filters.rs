use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

use crate::models::PixelRect;
use crate::pipeline::{RegionContext, RegionFilter};

/// Copy a rectangle out into its own scratch buffer
pub fn extract_region(img: &RgbaImage, rect: PixelRect) -> RgbaImage {
    imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Write a scratch buffer back; nothing outside `rect` is touched
pub fn paste_region(img: &mut RgbaImage, region: &RgbaImage, rect: PixelRect) {
    debug_assert_eq!(region.dimensions(), (rect.width, rect.height));
    imageops::replace(img, region, rect.x as i64, rect.y as i64);
}

/// Nearest-neighbour down- then up-sampling, which throws away fine detail for good
pub fn pixelate(region: &RgbaImage, scale: f32) -> RgbaImage {
    let (width, height) = region.dimensions();
    let thumb_w = ((width as f32 * scale) as u32).max(1);
    let thumb_h = ((height as f32 * scale) as u32).max(1);

    let thumb = imageops::resize(region, thumb_w, thumb_h, FilterType::Nearest);
    imageops::resize(&thumb, width, height, FilterType::Nearest)
}

/// Gaussian blur followed by an RGB brightness multiplier (alpha untouched)
pub fn soften(region: &RgbaImage, sigma: f32, brightness: f32) -> RgbaImage {
    // gaussian_blur_f32 panics on a non-positive sigma
    let (mut out, gain) = if sigma > 0.0 {
        (gaussian_blur_f32(region, sigma), blur_gain(sigma))
    } else {
        (region.clone(), 1.0)
    };

    let scale = brightness / gain;
    for (pixel, source) in out.pixels_mut().zip(region.pixels()) {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = (*channel as f32 * scale).round().clamp(0.0, 255.0) as u8;
        }
        pixel[3] = source[3];
    }
    out
}

/// Level a flat white patch comes back at after blurring, as a fraction of 255.
///
/// The u8 blur passes truncate, so a flat region loses a little brightness.
fn blur_gain(sigma: f32) -> f32 {
    let flat = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
    let level = gaussian_blur_f32(&flat, sigma).get_pixel(0, 0)[0];
    if level == 0 {
        1.0
    } else {
        level as f32 / 255.0
    }
}

/// Blocky mosaic of the region
pub struct PixelateFilter {
    pub scale: f32,
}

impl RegionFilter for PixelateFilter {
    fn apply(&self, region: RgbaImage, _context: &RegionContext) -> RgbaImage {
        pixelate(&region, self.scale)
    }

    fn name(&self) -> &str {
        "Pixelate"
    }
}

/// Blur and darken, softening block edges left by pixelation
pub struct SoftenFilter {
    pub sigma: f32,
    pub brightness: f32,
}

impl RegionFilter for SoftenFilter {
    fn apply(&self, region: RgbaImage, _context: &RegionContext) -> RgbaImage {
        soften(&region, self.sigma, self.brightness)
    }

    fn name(&self) -> &str {
        "Soften"
    }
}
