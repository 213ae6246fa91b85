use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use plateblur::{
    BatchFlag, Detection, Detector, DetectorError, EncodedImage, ItemProcessor, Queue,
    RedactionEngine,
};

/// Creates a w x h image with a smooth gradient, so that pixelation visibly
/// changes every region.
pub fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    })
}

/// The gradient image, PNG-encoded the way an uploaded file would arrive
pub fn gradient_png(width: u32, height: u32) -> EncodedImage {
    let mut out = Cursor::new(Vec::new());
    gradient_image(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode test image");
    EncodedImage::new(out.into_inner(), ImageFormat::Png)
}

/// Box covering pixels 10..30 on a 100x100 image (5..35 once padded)
pub fn plate_box() -> Detection {
    Detection::new([100.0, 100.0, 300.0, 300.0], "plate")
}

/// Mean absolute per-channel difference inside a rectangle
pub fn mean_diff(a: &RgbaImage, b: &RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) -> f64 {
    let mut total = 0u64;
    let mut count = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let pa = a.get_pixel(x, y);
            let pb = b.get_pixel(x, y);
            for c in 0..3 {
                total += (pa[c] as i32 - pb[c] as i32).unsigned_abs() as u64;
                count += 1;
            }
        }
    }
    total as f64 / count.max(1) as f64
}

pub type Scripted = Result<Vec<Detection>, DetectorError>;

/// Detector that replays a fixed list of responses, one per call.
///
/// Tracks how many calls overlap, and optionally samples a batch flag on
/// every call. Once the script runs out every call finds nothing.
#[derive(Default)]
pub struct ScriptedDetector {
    responses: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    flag: Mutex<Option<BatchFlag>>,
    flag_seen: Mutex<Vec<bool>>,
    delay: Duration,
}

impl ScriptedDetector {
    pub fn new(responses: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            delay: Duration::from_millis(5),
            ..Self::default()
        }
    }

    /// Always finds the single plate box
    pub fn finding_plate(times: usize) -> Self {
        Self::new((0..times).map(|_| Ok(vec![plate_box()])))
    }

    pub fn watch_flag(&self, flag: BatchFlag) {
        *self.flag.lock().unwrap() = Some(flag);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn flag_seen(&self) -> Vec<bool> {
        self.flag_seen.lock().unwrap().clone()
    }
}

impl Detector for ScriptedDetector {
    async fn detect(&self, _image: &EncodedImage) -> Result<Vec<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let watched = self.flag.lock().unwrap().clone();
        if let Some(flag) = watched {
            self.flag_seen.lock().unwrap().push(flag.get());
        }

        // Yield so any concurrent caller would overlap here
        tokio::time::sleep(self.delay).await;

        let response = self.responses.lock().unwrap().pop_front();
        self.active.fetch_sub(1, Ordering::SeqCst);
        response.unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Processor over `queue` using the default engine
pub fn processor(queue: &Queue, detector: Arc<ScriptedDetector>) -> ItemProcessor<ScriptedDetector> {
    ItemProcessor::new(queue.clone(), detector, RedactionEngine::default())
}
