//! Snapshots and video recording of the recordable frame

mod gst;
mod recorder;
mod snapshot;

pub use gst::GstSinkFactory;
pub use recorder::{Recorder, SinkFactory, VideoSink};
pub use snapshot::save_snapshot;

use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const RECORDING_FPS: u32 = 25;
pub const SNAPSHOT_EXTENSION: &str = "png";
pub const VIDEO_EXTENSION: &str = "mp4";

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("no frame available yet")]
    NoFrame,
    #[error("frame is {got_width}x{got_height}, recording is {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },
    #[error("video pipeline error: {0}")]
    Pipeline(String),
}

/// `<dir>/<prefix>_<YYYY-MM-DD_HH-MM-SS>.<ext>`, with `_<n>` appended when
/// that name is already taken
pub fn timestamped_path(dir: &Path, prefix: &str, ext: &str, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y-%m-%d_%H-%M-%S");
    let candidate = dir.join(format!("{}_{}.{}", prefix, stamp, ext));
    if !candidate.exists() {
        return candidate;
    }
    (1u32..)
        .map(|n| dir.join(format!("{}_{}_{}.{}", prefix, stamp, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Just the file name, for on-screen messages
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
