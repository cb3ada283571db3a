//! H.264/MP4 video sink on a GStreamer pipeline
//!
//! appsrc (RGBx) -> leaky queue -> videoconvert -> videoscale
//!   -> I420 at even size -> x264enc -> mp4mux -> filesink
//!
//! The queue drops the oldest frames when the encoder falls behind.

use super::{CaptureError, SinkFactory, VideoSink};
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use image::RgbImage;
use std::path::Path;
use tracing::{debug, info, warn};

const EOS_TIMEOUT_SECS: u64 = 5;
/// Frames held in front of the converter before the oldest is dropped
const RECORDING_QUEUE_FRAMES: u32 = 4;

fn pipeline_err(context: &str, e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Pipeline(format!("{}: {}", context, e))
}

fn make(factory: &str) -> Result<gstreamer::Element, CaptureError> {
    gstreamer::ElementFactory::make(factory)
        .build()
        .map_err(|e| pipeline_err(&format!("failed to create {}", factory), e))
}

fn make_frame_queue() -> Result<gstreamer::Element, CaptureError> {
    gstreamer::ElementFactory::make("queue")
        .property("max-size-buffers", RECORDING_QUEUE_FRAMES)
        .property("max-size-bytes", 0u32)
        .property("max-size-time", 0u64)
        .property_from_str("leaky", "downstream")
        .build()
        .map_err(|e| pipeline_err("failed to create queue", e))
}

/// Go to Playing, or back to Null if any element refuses
fn start_pipeline(pipeline: &gstreamer::Pipeline) -> Result<(), CaptureError> {
    if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
        if let Err(null_err) = pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %null_err, "Failed to reset recording pipeline");
        }
        return Err(pipeline_err("failed to start pipeline", e));
    }
    Ok(())
}

/// Builds [`GstSink`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct GstSinkFactory;

impl SinkFactory for GstSinkFactory {
    fn open(&self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Box<dyn VideoSink>, CaptureError> {
        Ok(Box::new(GstSink::new(path, width, height, fps)?))
    }
}

pub struct GstSink {
    pipeline: gstreamer::Pipeline,
    appsrc: AppSrc,
    fps: u32,
    frames: u64,
}

impl GstSink {
    pub fn new(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self, CaptureError> {
        gstreamer::init().map_err(|e| pipeline_err("GStreamer init failed", e))?;

        let fps = fps.max(1);
        // x264 wants even dimensions
        let out_width = (width & !1).max(2);
        let out_height = (height & !1).max(2);
        info!(
            path = %path.display(),
            width,
            height,
            out_width,
            out_height,
            fps,
            "Creating recording pipeline"
        );

        let pipeline = gstreamer::Pipeline::new();
        let appsrc = make("appsrc")?;
        let queue = make_frame_queue()?;
        let convert = make("videoconvert")?;
        let scale = make("videoscale")?;
        let encoded_caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "I420")
            .field("width", out_width as i32)
            .field("height", out_height as i32)
            .build();
        let capsfilter = gstreamer::ElementFactory::make("capsfilter")
            .property("caps", &encoded_caps)
            .build()
            .map_err(|e| pipeline_err("failed to create capsfilter", e))?;
        let encoder = gstreamer::ElementFactory::make("x264enc")
            .property_from_str("speed-preset", "ultrafast")
            .property_from_str("tune", "zerolatency")
            .build()
            .map_err(|e| pipeline_err("failed to create x264enc", e))?;
        let muxer = make("mp4mux")?;
        let filesink = gstreamer::ElementFactory::make("filesink")
            .property("location", &*path.to_string_lossy())
            .build()
            .map_err(|e| pipeline_err("failed to create filesink", e))?;

        let appsrc = appsrc
            .downcast::<AppSrc>()
            .map_err(|_| CaptureError::Pipeline("appsrc is not an AppSrc".into()))?;
        let input_caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGBx")
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gstreamer::Fraction::new(fps as i32, 1))
            .build();
        appsrc.set_caps(Some(&input_caps));
        appsrc.set_format(gstreamer::Format::Time);

        let elements: [&gstreamer::Element; 8] = [
            appsrc.upcast_ref(),
            &queue,
            &convert,
            &scale,
            &capsfilter,
            &encoder,
            &muxer,
            &filesink,
        ];
        pipeline
            .add_many(elements)
            .map_err(|e| pipeline_err("failed to add elements", e))?;
        gstreamer::Element::link_many(elements).map_err(|e| pipeline_err("failed to link elements", e))?;

        start_pipeline(&pipeline)?;

        Ok(Self {
            pipeline,
            appsrc,
            fps,
            frames: 0,
        })
    }

    fn frame_time(&self, index: u64) -> gstreamer::ClockTime {
        gstreamer::ClockTime::from_nseconds(index * 1_000_000_000 / u64::from(self.fps))
    }
}

impl VideoSink for GstSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), CaptureError> {
        // RGBx keeps every row 4-byte aligned, which is what GStreamer expects
        let mut data = Vec::with_capacity(frame.as_raw().len() / 3 * 4);
        for pixel in frame.pixels() {
            data.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 0]);
        }

        let pts = self.frame_time(self.frames);
        let duration = self.frame_time(self.frames + 1) - pts;
        let mut buffer = gstreamer::Buffer::from_mut_slice(data);
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| CaptureError::Pipeline("buffer is not writable".into()))?;
            buffer_ref.set_pts(pts);
            buffer_ref.set_duration(duration);
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| pipeline_err("failed to push frame", format!("{:?}", e)))?;
        self.frames += 1;
        if self.frames % 250 == 0 {
            debug!(frames = self.frames, "Recording frames pushed");
        }
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), CaptureError> {
        debug!(frames = self.frames, "Finishing recording pipeline");
        let eos = self
            .appsrc
            .end_of_stream()
            .map_err(|e| pipeline_err("failed to send EOS", format!("{:?}", e)));

        let mut result = eos.and_then(|_| self.wait_for_eos());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(error = %e, "Failed to stop recording pipeline");
            if result.is_ok() {
                result = Err(pipeline_err("failed to stop pipeline", e));
            }
        }
        result
    }
}

impl GstSink {
    fn wait_for_eos(&self) -> Result<(), CaptureError> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| CaptureError::Pipeline("pipeline has no bus".into()))?;
        let message = bus.timed_pop_filtered(
            gstreamer::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
            &[gstreamer::MessageType::Eos, gstreamer::MessageType::Error],
        );
        match message.as_ref().map(|m| m.view()) {
            Some(gstreamer::MessageView::Eos(..)) => Ok(()),
            Some(gstreamer::MessageView::Error(err)) => Err(CaptureError::Pipeline(format!(
                "{} ({})",
                err.error(),
                err.debug().map(|d| d.to_string()).unwrap_or_default()
            ))),
            _ => Err(CaptureError::Pipeline("timed out waiting for end of stream".into())),
        }
    }
}

impl Drop for GstSink {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_queue_is_bounded() {
        if gstreamer::init().is_err() {
            return;
        }
        let Ok(queue) = make_frame_queue() else {
            return;
        };
        assert_eq!(queue.property::<u32>("max-size-buffers"), RECORDING_QUEUE_FRAMES);
        assert_eq!(queue.property::<u32>("max-size-bytes"), 0);
        assert_eq!(queue.property::<u64>("max-size-time"), 0);
    }

    #[test]
    fn test_failed_start_resets_pipeline() {
        if gstreamer::init().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("out.mp4");
        let (Ok(src), Ok(sink)) = (make("fakesrc"), make("filesink")) else {
            return;
        };
        sink.set_property("location", &*missing.to_string_lossy());

        let pipeline = gstreamer::Pipeline::new();
        pipeline.add_many([&src, &sink]).unwrap();
        gstreamer::Element::link_many([&src, &sink]).unwrap();

        let result = start_pipeline(&pipeline);

        assert!(matches!(result, Err(CaptureError::Pipeline(_))));
        assert_eq!(pipeline.current_state(), gstreamer::State::Null);
    }
}
