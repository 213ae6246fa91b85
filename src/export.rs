use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::queue::{Queue, QueueItem};

pub const OUTPUT_PREFIX: &str = "blurred_";

/// Output file name for a processed image: `blurred_<original name>`.
///
/// Only the final path component of `file_name` is kept.
pub fn output_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{OUTPUT_PREFIX}{base}")
}

/// Write a completed item's processed image into `dir`.
///
/// Returns `None` for items that have no processed image yet.
pub async fn save_item(dir: &Path, item: &QueueItem) -> anyhow::Result<Option<PathBuf>> {
    let Some(processed) = item.processed_image() else {
        return Ok(None);
    };

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;

    let path = dir.join(output_name(item.file_name()));
    tokio::fs::write(&path, processed.bytes())
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;

    info!(path = %path.display(), "saved");
    Ok(Some(path))
}

/// Save every completed item in queue order, pausing `stagger` between files
pub async fn save_all(queue: &Queue, dir: &Path, stagger: Duration) -> anyhow::Result<Vec<PathBuf>> {
    let mut saved = Vec::new();
    for (idx, item) in queue.completed().await.iter().enumerate() {
        if idx > 0 && !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }
        if let Some(path) = save_item(dir, item).await? {
            saved.push(path);
        }
    }
    Ok(saved)
}
