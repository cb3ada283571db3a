//! Application state and the command state machine
//!
//! One `App` owns the live configuration, the settings store it writes
//! through to, the overlay state and the recorder. The main loop feeds it
//! frames and commands; nothing here touches SDL directly.

use crate::camera::CameraError;
use crate::capture::{display_name, save_snapshot, CaptureError, Recorder};
use crate::display::{DisplayError, PixelBuffer};
use crate::input::Command;
use crate::overlay::{self, OverlayContext, OverlayState};
use crate::pipeline::{self, Interpolation, Palette, Rotation};
use crate::settings::{Configuration, Setting, SettingsStore, MAX_SCALE, MIN_SCALE, SCALE_STEP};
use chrono::Local;
use image::{GrayImage, RgbImage};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("camera: {0}")]
    Camera(#[from] CameraError),
    #[error("display: {0}")]
    Display(#[from] DisplayError),
    #[error("capture: {0}")]
    Capture(#[from] CaptureError),
    #[error("frame processing panicked: {0}")]
    Tick(String),
}

/// Behaviour switches fixed at startup
#[derive(Debug, Clone, Copy)]
pub struct AppOptions {
    /// Keep the recorded frame size stable by refusing zoom while recording
    pub lock_zoom_while_recording: bool,
    /// Start with the gradient legend visible
    pub gradient_legend: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lock_zoom_while_recording: true,
            gradient_legend: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    config: Configuration,
    store: SettingsStore,
    overlay: OverlayState,
    recorder: Recorder,
    options: AppOptions,
    output_dir: PathBuf,
    /// Latest overlay-free frame, for snapshots and recording start
    last_recordable: Option<RgbImage>,
}

impl App {
    pub fn new(
        store: SettingsStore,
        config: Configuration,
        recorder: Recorder,
        output_dir: impl Into<PathBuf>,
        options: AppOptions,
    ) -> Self {
        Self {
            config,
            store,
            overlay: OverlayState::new(options.gradient_legend),
            recorder,
            options,
            output_dir: output_dir.into(),
            last_recordable: None,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Run the pipeline on one raw frame, feed the recorder and return the
    /// display frame with overlays drawn on it
    pub fn tick(
        &mut self,
        raw: &GrayImage,
        pointer: Option<(i32, i32)>,
        display_size: (u32, u32),
        now: Instant,
    ) -> PixelBuffer {
        let output = pipeline::process(raw, &self.config);
        if output.palette_fallback {
            self.persist(Setting::Palette(0));
        }

        self.recorder.write(&output.recordable);

        let mut buffer = PixelBuffer::from_rgb_image(&output.recordable);
        let ctx = OverlayContext {
            intensity: &output.intensity,
            palette: output.palette,
            pointer,
            display_size,
            recording_indicator: self.recorder.indicator_visible(now),
            now,
        };
        overlay::compose(&mut buffer, &self.overlay, &ctx);

        self.last_recordable = Some(output.recordable);
        buffer
    }

    pub fn handle_command(&mut self, command: Command, now: Instant) -> Flow {
        match command {
            Command::Quit => return Flow::Quit,
            Command::ToggleHelp => self.overlay.show_help = !self.overlay.show_help,
            Command::ToggleGradient => self.overlay.show_gradient = !self.overlay.show_gradient,
            Command::Rotate => {
                let next = (self.config.rotation_index + 1) % Rotation::COUNT;
                self.persist(Setting::Rotation(next));
                let message = format!("Rotate: {}°", self.config.rotation().degrees());
                self.overlay.show_message(message, now);
            },
            Command::NextPalette => {
                let next = (self.config.map_index + 1) % Palette::COUNT;
                self.persist(Setting::Palette(next));
                let name = Palette::from_index(self.config.map_index)
                    .unwrap_or_default()
                    .name();
                let message = format!(
                    "Color palette: {} of {} ({})",
                    self.config.map_index + 1,
                    Palette::COUNT,
                    name
                );
                self.overlay.show_message(message, now);
            },
            Command::NextInterpolation => {
                let next = (self.config.interpolation_index + 1) % Interpolation::COUNT;
                self.persist(Setting::Interpolation(next));
                let name = Interpolation::from_index(self.config.interpolation_index)
                    .unwrap_or(Interpolation::Linear)
                    .name();
                let message = format!(
                    "Interpolation: {} of {} ({})",
                    self.config.interpolation_index + 1,
                    Interpolation::COUNT,
                    name
                );
                self.overlay.show_message(message, now);
            },
            Command::ZoomIn => self.zoom(true, now),
            Command::ZoomOut => self.zoom(false, now),
            Command::Snapshot => self.snapshot(now),
            Command::ToggleRecording => self.toggle_recording(now),
        }
        Flow::Continue
    }

    /// Log a failure caught at the tick boundary and tell the operator
    pub fn report_error(&mut self, err: &AppError, now: Instant) {
        error!(error = %err, "Tick failed");
        self.overlay.show_message("An unexpected error occurred.", now);
    }

    /// Write one field through to disk. A failed write keeps the change in
    /// memory; the store has already logged it.
    fn persist(&mut self, setting: Setting) {
        self.store.update(&mut self.config, setting);
    }

    fn zoom(&mut self, zoom_in: bool, now: Instant) {
        if self.options.lock_zoom_while_recording && self.recorder.is_recording() {
            self.overlay.show_message("Zoom is locked while recording", now);
            return;
        }
        let current = self.config.scale_percent;
        let target = if zoom_in {
            current.saturating_add(SCALE_STEP).min(MAX_SCALE)
        } else {
            current.saturating_sub(SCALE_STEP).max(MIN_SCALE)
        };
        if target != current {
            self.persist(Setting::Scale(target));
        }
        let message = format!("Scale: {}%", self.config.scale_percent);
        self.overlay.show_message(message, now);
    }

    fn snapshot(&mut self, now: Instant) {
        let result = match &self.last_recordable {
            Some(frame) => save_snapshot(&self.output_dir, frame, Local::now()),
            None => Err(CaptureError::NoFrame),
        };
        match result {
            Ok(path) => {
                let message = format!("Saved: {}", display_name(&path));
                self.overlay.show_message(message, now);
            },
            Err(e) => {
                error!(error = %e, "Failed to save snapshot");
                self.overlay.show_message("Failed to save snapshot.", now);
            },
        }
    }

    fn toggle_recording(&mut self, now: Instant) {
        if let Some(result) = self.recorder.stop() {
            let message = match result {
                Ok(path) => format!("Recording stopped: {}", display_name(&path)),
                Err(_) => "Failed to stop recording.".to_string(),
            };
            self.overlay.show_message(message, now);
            return;
        }

        let started = match &self.last_recordable {
            Some(frame) => self.recorder.start(frame.width(), frame.height(), Local::now()),
            None => Err(CaptureError::NoFrame),
        };
        match started {
            Ok(path) => {
                info!(path = %path.display(), "Recording");
                let message = format!("Recording started: {}", display_name(&path));
                self.overlay.show_message(message, now);
            },
            Err(e) => {
                warn!(error = %e, "Failed to start recording");
                self.overlay.show_message("Failed to start recording.", now);
            },
        }
    }
}
