use super::{timestamped_path, CaptureError, SNAPSHOT_EXTENSION};
use chrono::{DateTime, Local};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write the recordable frame as a timestamped PNG in `dir`
pub fn save_snapshot(dir: &Path, frame: &RgbImage, now: DateTime<Local>) -> Result<PathBuf, CaptureError> {
    fs::create_dir_all(dir)?;
    let path = timestamped_path(dir, "snapshot", SNAPSHOT_EXTENSION, now);
    frame.save(&path)?;
    info!(path = %path.display(), width = frame.width(), height = frame.height(), "Snapshot saved");
    Ok(path)
}
