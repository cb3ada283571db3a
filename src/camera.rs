//! V4L2 frame acquisition
//!
//! Thermal USB cameras enumerate as ordinary UVC devices. We ask for YUYV at
//! the sensor resolution and keep only the luma plane, which carries the
//! thermal intensity. Whatever the driver actually negotiates is decoded as
//! long as it is one of the single-channel or YUYV formats below.

use crate::settings::CameraSource;
use image::GrayImage;
use std::io;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

pub const SENSOR_WIDTH: u32 = 256;
pub const SENSOR_HEIGHT: u32 = 192;
pub const CAMERA_OPEN_ATTEMPTS: u32 = 3;
pub const CAMERA_RETRY_BACKOFF: Duration = Duration::from_secs(1);

const BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("failed to open {source_name}: {error}")]
    Open { source_name: String, error: io::Error },
    #[error("failed to configure {source_name}: {error}")]
    Configure { source_name: String, error: io::Error },
    #[error("frame read failed: {0}")]
    Read(#[from] io::Error),
    #[error("unsupported pixel format {0}")]
    UnsupportedFormat(String),
    #[error("short frame: got {got} bytes, expected {expected}")]
    ShortFrame { got: usize, expected: usize },
}

/// Anything that yields intensity frames, one per call
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<GrayImage, CameraError>;
}

/// Raw layouts we know how to turn into intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormat {
    /// Packed 4:2:2, luma on even bytes
    Yuyv,
    /// 8-bit greyscale
    Grey,
    /// 16-bit little-endian greyscale
    Y16,
}

impl RawFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(RawFormat::Yuyv),
            b"GREY" => Some(RawFormat::Grey),
            b"Y16 " => Some(RawFormat::Y16),
            _ => None,
        }
    }

    fn bytes_per_pixel(&self) -> usize {
        match self {
            RawFormat::Grey => 1,
            RawFormat::Yuyv | RawFormat::Y16 => 2,
        }
    }
}

/// Convert one raw buffer into an intensity image
pub fn decode(raw: &[u8], width: u32, height: u32, format: RawFormat) -> Result<GrayImage, CameraError> {
    let pixels = width as usize * height as usize;
    let expected = pixels * format.bytes_per_pixel();
    if raw.len() < expected {
        return Err(CameraError::ShortFrame {
            got: raw.len(),
            expected,
        });
    }

    let data: Vec<u8> = match format {
        RawFormat::Grey => raw[..pixels].to_vec(),
        RawFormat::Yuyv => raw[..expected].iter().step_by(2).copied().collect(),
        RawFormat::Y16 => stretch_y16(&raw[..expected]),
    };

    GrayImage::from_raw(width, height, data).ok_or(CameraError::ShortFrame {
        got: raw.len(),
        expected,
    })
}

/// Map the observed 16-bit range onto 0..=255. Thermal sensors fill only
/// 12 to 14 bits of each sample.
fn stretch_y16(raw: &[u8]) -> Vec<u8> {
    let samples: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let (min, max) = samples
        .iter()
        .fold((u16::MAX, u16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max <= min {
        return vec![0; samples.len()];
    }
    let range = u32::from(max - min);
    samples
        .iter()
        .map(|&v| ((u32::from(v - min) * 255 + range / 2) / range) as u8)
        .collect()
}

/// A streaming V4L2 capture device
pub struct V4lCamera {
    stream: MmapStream<'static>,
    width: u32,
    height: u32,
    format: RawFormat,
    frames: u64,
}

impl V4lCamera {
    pub fn open(source: &CameraSource) -> Result<Self, CameraError> {
        let source_name = source.to_string();
        let mut device = match source {
            CameraSource::Index(index) => Device::new(*index as usize),
            CameraSource::Path(path) => Device::with_path(path),
        }
        .map_err(|error| CameraError::Open {
            source_name: source_name.clone(),
            error,
        })?;

        let requested = Format::new(SENSOR_WIDTH, SENSOR_HEIGHT, FourCC::new(b"YUYV"));
        let format = match device.set_format(&requested) {
            Ok(format) => format,
            Err(e) => {
                warn!(source = %source_name, error = %e, "Could not set format, using current device format");
                device.format().map_err(|error| CameraError::Configure {
                    source_name: source_name.clone(),
                    error,
                })?
            },
        };

        let raw_format = RawFormat::from_fourcc(format.fourcc)
            .ok_or_else(|| CameraError::UnsupportedFormat(format.fourcc.to_string()))?;

        let stream = MmapStream::with_buffers(&mut device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|error| CameraError::Configure {
                source_name: source_name.clone(),
                error,
            })?;

        info!(
            source = %source_name,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "Camera opened"
        );

        Ok(Self {
            stream,
            width: format.width,
            height: format.height,
            format: raw_format,
            frames: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FrameSource for V4lCamera {
    fn read_frame(&mut self) -> Result<GrayImage, CameraError> {
        let (buf, meta) = self.stream.next()?;
        let frame = decode(buf, self.width, self.height, self.format)?;
        self.frames += 1;
        if self.frames % 250 == 0 {
            debug!(frames = self.frames, sequence = meta.sequence, "Capturing");
        }
        Ok(frame)
    }
}

impl Drop for V4lCamera {
    fn drop(&mut self) {
        info!(frames = self.frames, "Releasing camera");
    }
}

/// Try `open` up to `attempts` times, sleeping `backoff` between failures
pub fn open_with_retry<T, F>(mut open: F, attempts: u32, backoff: Duration) -> Result<T, CameraError>
where
    F: FnMut() -> Result<T, CameraError>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match open() {
            Ok(camera) => return Ok(camera),
            Err(e) if attempt >= attempts => {
                error!(attempt, error = %e, "Camera open failed, giving up");
                return Err(e);
            },
            Err(e) => {
                warn!(attempt, error = %e, "Camera open failed, retrying");
                thread::sleep(backoff);
                attempt += 1;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_yuyv_keeps_luma() {
        // Two pixels: Y0 U Y1 V
        let raw = [10, 128, 20, 128, 30, 128, 40, 128];
        let frame = decode(&raw, 2, 2, RawFormat::Yuyv).unwrap();
        assert_eq!(frame.as_raw(), &vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_decode_y16_stretches_full_range() {
        // 0x1000, 0x1020, 0x1040: same high byte, still three distinct levels
        let raw = [0x00, 0x10, 0x20, 0x10, 0x40, 0x10];
        let frame = decode(&raw, 3, 1, RawFormat::Y16).unwrap();
        assert_eq!(frame.as_raw(), &vec![0, 128, 255]);
    }

    #[test]
    fn test_decode_y16_flat_frame_is_black() {
        let raw = [0x34, 0x12, 0x34, 0x12];
        let frame = decode(&raw, 2, 1, RawFormat::Y16).unwrap();
        assert_eq!(frame.as_raw(), &vec![0, 0]);
    }

    #[test]
    fn test_decode_rejects_short_buffers() {
        let err = decode(&[1, 2, 3], 2, 2, RawFormat::Grey).unwrap_err();
        assert!(matches!(err, CameraError::ShortFrame { got: 3, expected: 4 }));
    }

    #[test]
    fn test_decode_ignores_trailing_padding() {
        let raw = [1, 2, 3, 4, 99, 99];
        let frame = decode(&raw, 2, 2, RawFormat::Grey).unwrap();
        assert_eq!(frame.as_raw(), &vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_fourcc_mapping() {
        assert_eq!(RawFormat::from_fourcc(FourCC::new(b"YUYV")), Some(RawFormat::Yuyv));
        assert_eq!(RawFormat::from_fourcc(FourCC::new(b"MJPG")), None);
    }

    #[test]
    fn test_retry_succeeds_after_failures() {
        let mut calls = 0;
        let result = open_with_retry(
            || {
                calls += 1;
                if calls < 3 {
                    Err(CameraError::UnsupportedFormat("test".into()))
                } else {
                    Ok(calls)
                }
            },
            3,
            Duration::ZERO,
        );
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_is_bounded() {
        let mut calls = 0;
        let result: Result<(), _> = open_with_retry(
            || {
                calls += 1;
                Err(CameraError::UnsupportedFormat("test".into()))
            },
            3,
            Duration::ZERO,
        );
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
