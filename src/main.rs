// Some accessors are only exercised from unit tests
#![allow(dead_code)]

mod app;
mod camera;
mod capture;
mod display;
mod input;
mod live;
mod logging;
mod overlay;
mod pipeline;
mod settings;
mod util;

use app::{App, AppError, AppOptions};
use camera::{V4lCamera, CAMERA_OPEN_ATTEMPTS, CAMERA_RETRY_BACKOFF};
use capture::{GstSinkFactory, Recorder, RECORDING_FPS};
use clap::Parser;
use display::{Display, Screen};
use logging::LogConfig;
use settings::SettingsStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

const WINDOW_TITLE: &str = "Thermal Camera";

#[derive(Parser, Debug)]
#[command(name = "thermview")]
#[command(about = "Live false-colour viewer for USB thermal cameras")]
#[command(version)]
struct Cli {
    /// Settings file, created with defaults on first run
    #[arg(long, default_value = "settings/config.json")]
    settings: PathBuf,

    /// Where snapshots and recordings are written
    #[arg(long, default_value = "snapshots")]
    output_dir: PathBuf,

    /// Where error.log is appended
    #[arg(long, default_value = "debug")]
    log_dir: PathBuf,

    /// Let +/- change the scale during a recording
    #[arg(long)]
    allow_zoom_while_recording: bool,

    /// Start with the gradient legend hidden
    #[arg(long)]
    no_gradient: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        log_dir: cli.log_dir.clone(),
        ..LogConfig::default()
    };
    let _log_guard = logging::init_logging(&log_config).map_err(|e| e as Box<dyn std::error::Error>)?;

    if let Err(e) = run(&cli) {
        error!(error = %e, "Exiting on fatal error");
        return Err(e.into());
    }
    info!("Bye");
    Ok(())
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let store = SettingsStore::new(&cli.settings);
    let config = store.load();

    let source = config.camera_source.clone();
    info!(source = %source, "Opening camera");
    let mut camera = camera::open_with_retry(
        || V4lCamera::open(&source),
        CAMERA_OPEN_ATTEMPTS,
        CAMERA_RETRY_BACKOFF,
    )
    .inspect_err(|e| error!(source = %source, error = %e, "Camera could not be opened"))?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || stop_flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "Could not install interrupt handler");
    }

    // Initial window size; `Screen::show` follows any later change
    let (cam_w, cam_h) = camera.dimensions();
    let (rot_w, rot_h) = if config.rotation().degrees() % 180 == 90 {
        (cam_h, cam_w)
    } else {
        (cam_w, cam_h)
    };
    let (win_w, win_h) = pipeline::scaled_dimensions(rot_w, rot_h, config.scale_percent);
    let (display, texture_creator) = Display::new(WINDOW_TITLE, win_w, win_h)?;
    let mut screen = Screen::new(display, &texture_creator)?;

    let recorder = Recorder::new(Box::new(GstSinkFactory), &cli.output_dir, RECORDING_FPS);
    let options = AppOptions {
        lock_zoom_while_recording: !cli.allow_zoom_while_recording,
        gradient_legend: !cli.no_gradient,
    };
    let mut app = App::new(store, config, recorder, &cli.output_dir, options);

    info!(
        width = win_w,
        height = win_h,
        output_dir = %cli.output_dir.display(),
        "Live view started"
    );

    let reason = live::run(&mut app, &mut camera, &mut screen, &stop);

    // Locals drop in reverse order: the recording is finalized first, then
    // the window goes away, then the camera stops streaming
    info!(reason = ?reason, recording = app.is_recording(), "Shutting down");
    Ok(())
}
