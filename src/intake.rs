use std::path::Path;

use anyhow::Context;
use image::ImageFormat;
use tracing::debug;

use crate::models::EncodedImage;
use crate::queue::{ItemId, Queue};

/// Image format of a file, from its content first and its extension second
pub fn sniff_format(path: &Path, data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data)
        .ok()
        .or_else(|| ImageFormat::from_path(path).ok())
}

/// Enqueue one file's bytes as a new pending item.
///
/// Returns `None` (and enqueues nothing) when the bytes are not an image.
pub async fn enqueue_bytes(queue: &Queue, path: &Path, data: Vec<u8>) -> Option<ItemId> {
    let Some(format) = sniff_format(path, &data) else {
        debug!(path = %path.display(), "not an image, dropped");
        return None;
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    Some(queue.add(file_name, EncodedImage::new(data, format)).await)
}

/// Read files and enqueue the images among them, in argument order.
///
/// Non-image files are silently skipped; unreadable files are an error.
pub async fn enqueue_paths<P: AsRef<Path>>(queue: &Queue, paths: &[P]) -> anyhow::Result<Vec<ItemId>> {
    let mut ids = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        if let Some(id) = enqueue_bytes(queue, path, data).await {
            ids.push(id);
        }
    }
    Ok(ids)
}
