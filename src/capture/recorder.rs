//! Recording session lifecycle: Idle -> Recording -> Idle

use super::{timestamped_path, CaptureError, VIDEO_EXTENSION};
use chrono::{DateTime, Local};
use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub const BLINK_INTERVAL: Duration = Duration::from_secs(1);

/// Destination for a stream of equally sized frames
pub trait VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), CaptureError>;

    /// Flush and close. The file is complete once this returns `Ok`.
    fn finish(self: Box<Self>) -> Result<(), CaptureError>;
}

/// Opens video sinks bound to a fixed size and frame rate
pub trait SinkFactory {
    fn open(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn VideoSink>, CaptureError>;
}

/// Wall-clock driven on/off phase for the recording indicator
#[derive(Debug, Clone, Copy)]
pub struct Blink {
    visible: bool,
    last_toggle: Instant,
    interval: Duration,
}

impl Blink {
    pub fn new(now: Instant, interval: Duration) -> Self {
        Self {
            visible: true,
            last_toggle: now,
            interval,
        }
    }

    /// Advance to `now` and report whether the indicator is shown
    pub fn update(&mut self, now: Instant) -> bool {
        if self.interval.is_zero() {
            return self.visible;
        }
        while now.saturating_duration_since(self.last_toggle) >= self.interval {
            self.visible = !self.visible;
            self.last_toggle += self.interval;
        }
        self.visible
    }
}

/// One open recording
pub struct RecordingSession {
    sink: Box<dyn VideoSink>,
    path: PathBuf,
    width: u32,
    height: u32,
    frames: u64,
    blink: Blink,
}

impl RecordingSession {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn write(&mut self, frame: &RgbImage) -> Result<(), CaptureError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(CaptureError::FrameSize {
                width: self.width,
                height: self.height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        self.sink.write_frame(frame)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(self) -> Result<PathBuf, CaptureError> {
        let Self { sink, path, frames, .. } = self;
        sink.finish()?;
        info!(path = %path.display(), frames, "Recording finalized");
        Ok(path)
    }
}

/// Owns at most one recording session
pub struct Recorder {
    factory: Box<dyn SinkFactory>,
    output_dir: PathBuf,
    fps: u32,
    session: Option<RecordingSession>,
    write_failures: u64,
}

impl Recorder {
    pub fn new(factory: Box<dyn SinkFactory>, output_dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            factory,
            output_dir: output_dir.into(),
            fps,
            session: None,
            write_failures: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Open a sink for frames of `width`x`height`. A second start while a
    /// session is open is rejected and the open session is left alone.
    pub fn start(&mut self, width: u32, height: u32, now: DateTime<Local>) -> Result<PathBuf, CaptureError> {
        if self.session.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        fs::create_dir_all(&self.output_dir)?;
        let path = timestamped_path(&self.output_dir, "capture", VIDEO_EXTENSION, now);
        let sink = self.factory.open(&path, width, height, self.fps)?;

        info!(path = %path.display(), width, height, fps = self.fps, "Recording started");
        self.write_failures = 0;
        self.session = Some(RecordingSession {
            sink,
            path: path.clone(),
            width,
            height,
            frames: 0,
            blink: Blink::new(Instant::now(), BLINK_INTERVAL),
        });
        Ok(path)
    }

    /// Close the open session, if any. The recorder is idle afterwards
    /// whether or not the sink closed cleanly.
    pub fn stop(&mut self) -> Option<Result<PathBuf, CaptureError>> {
        let session = self.session.take()?;
        let path = session.path.clone();
        let result = session.finish();
        if let Err(e) = &result {
            error!(path = %path.display(), error = %e, "Failed to close recording");
        }
        Some(result)
    }

    /// Append a frame to the open session. Failures are logged and the
    /// session stays open.
    pub fn write(&mut self, frame: &RgbImage) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.write(frame) {
            self.write_failures += 1;
            if self.write_failures == 1 || self.write_failures % 100 == 0 {
                warn!(failures = self.write_failures, error = %e, "Failed to write recording frame");
            }
        }
    }

    /// Whether the REC indicator is lit at `now`; always false when idle
    pub fn indicator_visible(&mut self, now: Instant) -> bool {
        self.session
            .as_mut()
            .map(|session| session.blink.update(now))
            .unwrap_or(false)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("Closing recording on shutdown");
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Writes a line per frame to the real file and a trailer on finish
    struct FileSink {
        path: PathBuf,
        lines: Vec<String>,
        fail_writes: bool,
    }

    impl VideoSink for FileSink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<(), CaptureError> {
            if self.fail_writes {
                return Err(CaptureError::Pipeline("encoder stalled".into()));
            }
            self.lines.push(format!("{}x{}", frame.width(), frame.height()));
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<(), CaptureError> {
            let mut body = self.lines.join("\n");
            body.push_str("\nEND\n");
            fs::write(&self.path, body)?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        opened: Rc<RefCell<Vec<PathBuf>>>,
        fail_open: bool,
        fail_writes: bool,
    }

    impl SinkFactory for FakeFactory {
        fn open(&self, path: &Path, _w: u32, _h: u32, _fps: u32) -> Result<Box<dyn VideoSink>, CaptureError> {
            if self.fail_open {
                return Err(CaptureError::Pipeline("no encoder".into()));
            }
            fs::write(path, b"")?;
            self.opened.borrow_mut().push(path.to_path_buf());
            Ok(Box::new(FileSink {
                path: path.to_path_buf(),
                lines: Vec::new(),
                fail_writes: self.fail_writes,
            }))
        }
    }

    fn recorder(dir: &Path, factory: FakeFactory) -> Recorder {
        Recorder::new(Box::new(factory), dir.join("out"), 25)
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path(), FakeFactory::default());
        assert!(rec.stop().is_none());
        assert!(!rec.is_recording());
        assert!(!dir.path().join("out").exists(), "nothing created");
    }

    #[test]
    fn test_toggle_twice_creates_one_finalized_file() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::default();
        let opened = Rc::clone(&factory.opened);
        let mut rec = recorder(dir.path(), factory);

        let started = rec.start(64, 48, Local::now()).unwrap();
        let stopped = rec.stop().unwrap().unwrap();
        assert_eq!(started, stopped);
        assert!(!rec.is_recording());

        let files: Vec<_> = fs::read_dir(dir.path().join("out")).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(opened.borrow().len(), 1);
        assert!(fs::read_to_string(&stopped).unwrap().ends_with("END\n"), "finalized");
        assert!(stopped.to_string_lossy().ends_with(".mp4"));
    }

    #[test]
    fn test_second_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::default();
        let opened = Rc::clone(&factory.opened);
        let mut rec = recorder(dir.path(), factory);

        let first = rec.start(8, 8, Local::now()).unwrap();
        assert!(matches!(rec.start(8, 8, Local::now()), Err(CaptureError::AlreadyRecording)));
        assert_eq!(opened.borrow().len(), 1);
        assert_eq!(rec.session().map(|s| s.path().to_path_buf()), Some(first));
    }

    #[test]
    fn test_failed_open_stays_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(
            dir.path(),
            FakeFactory {
                fail_open: true,
                ..Default::default()
            },
        );
        assert!(rec.start(8, 8, Local::now()).is_err());
        assert!(!rec.is_recording());
        assert!(!rec.indicator_visible(Instant::now()));
    }

    #[test]
    fn test_frames_are_written_and_size_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path(), FakeFactory::default());
        rec.start(4, 2, Local::now()).unwrap();

        rec.write(&RgbImage::from_pixel(4, 2, Rgb([1, 2, 3])));
        rec.write(&RgbImage::new(2, 4));
        rec.write(&RgbImage::new(4, 2));
        assert_eq!(rec.session().map(RecordingSession::frames), Some(2));
        assert!(rec.is_recording(), "mismatched frame does not end the session");

        let path = rec.stop().unwrap().unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "4x2\n4x2\nEND\n");
    }

    #[test]
    fn test_write_failures_keep_recording() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(
            dir.path(),
            FakeFactory {
                fail_writes: true,
                ..Default::default()
            },
        );
        rec.start(2, 2, Local::now()).unwrap();
        for _ in 0..3 {
            rec.write(&RgbImage::new(2, 2));
        }
        assert!(rec.is_recording());
        assert_eq!(rec.session().map(RecordingSession::frames), Some(0));
    }

    #[test]
    fn test_drop_finalizes_open_session() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::default();
        let opened = Rc::clone(&factory.opened);
        {
            let mut rec = recorder(dir.path(), factory);
            rec.start(2, 2, Local::now()).unwrap();
        }
        let path = opened.borrow()[0].clone();
        assert_eq!(fs::read_to_string(path).unwrap(), "\nEND\n");
    }

    #[test]
    fn test_blink_toggles_on_wall_clock() {
        let start = Instant::now();
        let mut blink = Blink::new(start, Duration::from_secs(1));
        assert!(blink.update(start));
        assert!(blink.update(start + Duration::from_millis(999)));
        assert!(!blink.update(start + Duration::from_millis(1000)));
        assert!(blink.update(start + Duration::from_millis(2100)));
        // A long stall still lands on the right phase
        assert!(!blink.update(start + Duration::from_millis(5500)));
    }
}
