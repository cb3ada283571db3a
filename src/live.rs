//! The live view loop: read a frame, tick the app, show it, dispatch input
//!
//! Each frame tick and each command runs behind `catch_unwind`, so a panic
//! anywhere below the app is reported on screen and the loop carries on.
//! Only a stream failure, a quit command or the interrupt flag end it.

use crate::app::{App, AppError, Flow};
use crate::camera::{CameraError, FrameSource};
use crate::display::{DisplayError, InputEvent, PixelBuffer, Screen};
use crate::input::InputState;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info};

pub const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Where composed frames go and input comes from
pub trait Viewport {
    fn size(&self) -> (u32, u32);
    fn show(&mut self, buffer: &PixelBuffer) -> Result<(), DisplayError>;
    fn poll_events(&mut self, timeout: Duration) -> Vec<InputEvent>;
}

impl Viewport for Screen<'_> {
    fn size(&self) -> (u32, u32) {
        Screen::size(self)
    }

    fn show(&mut self, buffer: &PixelBuffer) -> Result<(), DisplayError> {
        Screen::show(self, buffer)
    }

    fn poll_events(&mut self, timeout: Duration) -> Vec<InputEvent> {
        Screen::poll_events(self, timeout)
    }
}

/// Why the loop returned
#[derive(Debug)]
pub enum ExitReason {
    Quit,
    Interrupted,
    StreamEnded(CameraError),
}

/// Run until quit, interrupt or the end of the camera stream. An open
/// recording is closed when `app` is dropped.
pub fn run<S, V>(app: &mut App, source: &mut S, viewport: &mut V, stop: &AtomicBool) -> ExitReason
where
    S: FrameSource + ?Sized,
    V: Viewport + ?Sized,
{
    let mut input = InputState::default();
    loop {
        if stop.load(Ordering::SeqCst) {
            info!("Interrupted");
            return ExitReason::Interrupted;
        }

        let raw = match source.read_frame() {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Camera stream ended");
                return ExitReason::StreamEnded(e);
            },
        };

        let now = Instant::now();
        let display_size = viewport.size();
        let pointer = input.pointer();
        match guarded(|| app.tick(&raw, pointer, display_size, now)) {
            Ok(buffer) => {
                if let Err(e) = viewport.show(&buffer) {
                    app.report_error(&AppError::from(e), now);
                }
            },
            Err(e) => app.report_error(&e, now),
        }

        let now = Instant::now();
        for event in viewport.poll_events(INPUT_POLL_TIMEOUT) {
            let Some(command) = input.handle(&event) else {
                continue;
            };
            match guarded(|| app.handle_command(command, now)) {
                Ok(Flow::Quit) => {
                    info!("Quit requested");
                    return ExitReason::Quit;
                },
                Ok(Flow::Continue) => {},
                Err(e) => app.report_error(&e, now),
            }
        }
    }
}

fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, AppError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| AppError::Tick(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppOptions;
    use crate::capture::{CaptureError, Recorder, SinkFactory, VideoSink};
    use crate::settings::SettingsStore;
    use image::{GrayImage, Luma, RgbImage};
    use sdl2::keyboard::Keycode;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::path::Path;
    use std::rc::Rc;

    const UNEXPECTED: &str = "An unexpected error occurred.";

    type Log = Rc<RefCell<Vec<&'static str>>>;

    /// Yields `remaining` frames, then fails like an unplugged camera
    struct CountedSource {
        remaining: usize,
        reads: usize,
    }

    impl CountedSource {
        fn new(frames: usize) -> Self {
            Self {
                remaining: frames,
                reads: 0,
            }
        }
    }

    impl FrameSource for CountedSource {
        fn read_frame(&mut self) -> Result<GrayImage, CameraError> {
            self.reads += 1;
            if self.remaining == 0 {
                return Err(CameraError::Read(io::Error::new(io::ErrorKind::UnexpectedEof, "unplugged")));
            }
            self.remaining -= 1;
            Ok(GrayImage::from_fn(8, 6, |x, y| Luma([(x * 30 + y) as u8])))
        }
    }

    /// Hands out one batch of events per tick
    #[derive(Default)]
    struct ScriptedViewport {
        script: VecDeque<Vec<InputEvent>>,
        shown: usize,
        fail_show: bool,
    }

    impl ScriptedViewport {
        fn with_script(script: Vec<Vec<InputEvent>>) -> Self {
            Self {
                script: script.into(),
                ..Self::default()
            }
        }
    }

    impl Viewport for ScriptedViewport {
        fn size(&self) -> (u32, u32) {
            (36, 48)
        }

        fn show(&mut self, _buffer: &PixelBuffer) -> Result<(), DisplayError> {
            if self.fail_show {
                return Err(DisplayError::Present("lost device".into()));
            }
            self.shown += 1;
            Ok(())
        }

        fn poll_events(&mut self, _timeout: Duration) -> Vec<InputEvent> {
            self.script.pop_front().unwrap_or_default()
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Fault {
        None,
        PanicOnOpen,
        PanicOnWrite,
    }

    struct LoggingSink {
        log: Log,
        fault: Fault,
    }

    impl VideoSink for LoggingSink {
        fn write_frame(&mut self, _frame: &RgbImage) -> Result<(), CaptureError> {
            if self.fault == Fault::PanicOnWrite {
                panic!("encoder blew up");
            }
            self.log.borrow_mut().push("frame");
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<(), CaptureError> {
            self.log.borrow_mut().push("finish");
            Ok(())
        }
    }

    struct LoggingFactory {
        log: Log,
        fault: Fault,
    }

    impl SinkFactory for LoggingFactory {
        fn open(&self, _path: &Path, _w: u32, _h: u32, _fps: u32) -> Result<Box<dyn VideoSink>, CaptureError> {
            if self.fault == Fault::PanicOnOpen {
                panic!("element factory missing");
            }
            self.log.borrow_mut().push("open");
            Ok(Box::new(LoggingSink {
                log: Rc::clone(&self.log),
                fault: self.fault,
            }))
        }
    }

    fn app(dir: &Path, fault: Fault) -> (App, Log) {
        let log = Log::default();
        let store = SettingsStore::new(dir.join("settings").join("config.json"));
        let config = store.load();
        let factory = LoggingFactory {
            log: Rc::clone(&log),
            fault,
        };
        let output = dir.join("snapshots");
        let recorder = Recorder::new(Box::new(factory), &output, 25);
        (App::new(store, config, recorder, &output, AppOptions::default()), log)
    }

    fn key(code: Keycode) -> Vec<InputEvent> {
        vec![InputEvent::KeyDown(code)]
    }

    fn message(app: &App) -> Option<String> {
        app.overlay().active_message(Instant::now()).map(str::to_string)
    }

    #[test]
    fn test_read_failure_ends_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _log) = app(dir.path(), Fault::None);
        let mut source = CountedSource::new(3);
        let mut viewport = ScriptedViewport::default();

        let reason = run(&mut app, &mut source, &mut viewport, &AtomicBool::new(false));

        assert!(matches!(reason, ExitReason::StreamEnded(CameraError::Read(_))));
        assert_eq!(viewport.shown, 3);
        assert_eq!(source.reads, 4, "one failed read ends it");
    }

    #[test]
    fn test_interrupt_flag_stops_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _log) = app(dir.path(), Fault::None);
        let mut source = CountedSource::new(3);
        let mut viewport = ScriptedViewport::default();

        let reason = run(&mut app, &mut source, &mut viewport, &AtomicBool::new(true));

        assert!(matches!(reason, ExitReason::Interrupted));
        assert_eq!(source.reads, 0);
    }

    #[test]
    fn test_recording_closed_after_stream_ends() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, log) = app(dir.path(), Fault::None);
        let mut source = CountedSource::new(3);
        let mut viewport = ScriptedViewport::with_script(vec![key(Keycode::V)]);

        let reason = run(&mut app, &mut source, &mut viewport, &AtomicBool::new(false));

        assert!(matches!(reason, ExitReason::StreamEnded(_)));
        assert!(app.is_recording(), "still open until the app goes away");
        drop(app);
        assert_eq!(*log.borrow(), vec!["open", "frame", "frame", "finish"]);
    }

    #[test]
    fn test_recording_closed_after_quit() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, log) = app(dir.path(), Fault::None);
        let mut source = CountedSource::new(10);
        let mut viewport = ScriptedViewport::with_script(vec![key(Keycode::V), key(Keycode::Q)]);

        let reason = run(&mut app, &mut source, &mut viewport, &AtomicBool::new(false));

        assert!(matches!(reason, ExitReason::Quit));
        assert_eq!(source.reads, 2);
        drop(app);
        assert_eq!(log.borrow().last(), Some(&"finish"));
    }

    #[test]
    fn test_panicking_command_is_reported_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _log) = app(dir.path(), Fault::PanicOnOpen);
        let mut source = CountedSource::new(3);
        let mut viewport = ScriptedViewport::with_script(vec![key(Keycode::V)]);

        let reason = run(&mut app, &mut source, &mut viewport, &AtomicBool::new(false));

        assert!(matches!(reason, ExitReason::StreamEnded(_)));
        assert_eq!(viewport.shown, 3, "frames kept flowing after the panic");
        assert!(!app.is_recording());
        assert_eq!(message(&app).as_deref(), Some(UNEXPECTED));
    }

    #[test]
    fn test_panicking_tick_is_reported_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _log) = app(dir.path(), Fault::PanicOnWrite);
        let mut source = CountedSource::new(3);
        let mut viewport = ScriptedViewport::with_script(vec![key(Keycode::V)]);

        let reason = run(&mut app, &mut source, &mut viewport, &AtomicBool::new(false));

        assert!(matches!(reason, ExitReason::StreamEnded(_)));
        assert_eq!(source.reads, 4, "every frame was read");
        assert_eq!(viewport.shown, 1, "only the tick before recording got shown");
        assert_eq!(message(&app).as_deref(), Some(UNEXPECTED));
    }

    #[test]
    fn test_present_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _log) = app(dir.path(), Fault::None);
        let mut source = CountedSource::new(2);
        let mut viewport = ScriptedViewport {
            fail_show: true,
            ..ScriptedViewport::default()
        };

        let reason = run(&mut app, &mut source, &mut viewport, &AtomicBool::new(false));

        assert!(matches!(reason, ExitReason::StreamEnded(_)));
        assert_eq!(message(&app).as_deref(), Some(UNEXPECTED));
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
