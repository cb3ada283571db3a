//! Per-frame processing chain
//!
//! raw intensity -> rotate -> min/max stretch -> palette -> resize
//!
//! The result is the recordable frame: what snapshots and recordings see.
//! Overlays are composited later on a copy, so they never reach the files.

mod palette;
mod transform;

pub use palette::Palette;
pub use transform::{resize, scaled_dimensions, Interpolation, Rotation};

use crate::settings::Configuration;
use image::{GrayImage, RgbImage};
use tracing::warn;

/// Everything one tick of the pipeline produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Rotated and normalised intensity at sensor resolution
    pub intensity: GrayImage,
    /// Palettised and resized frame, free of overlays
    pub recordable: RgbImage,
    /// Palette actually used
    pub palette: Palette,
    /// The configured palette index was invalid and palette 0 was used
    pub palette_fallback: bool,
}

/// Stretch the observed min..max range linearly onto 0..=255.
/// A flat frame has no contrast to stretch and comes out black.
pub fn normalize(frame: &GrayImage) -> GrayImage {
    let (min, max) = frame
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    let mut out = GrayImage::new(frame.width(), frame.height());
    if max <= min {
        return out;
    }
    let range = u32::from(max - min);
    for (dst, src) in out.pixels_mut().zip(frame.pixels()) {
        let offset = u32::from(src[0] - min);
        dst[0] = ((offset * 255 + range / 2) / range) as u8;
    }
    out
}

/// Run the full chain for one captured frame
pub fn process(raw: &GrayImage, config: &Configuration) -> PipelineOutput {
    let rotated = config.rotation().apply(raw);
    let intensity = normalize(&rotated);

    let (palette, palette_fallback) = match Palette::from_index(config.map_index) {
        Some(palette) => (palette, false),
        None => {
            warn!(map_index = config.map_index, "Invalid palette index, using palette 0");
            (Palette::default(), true)
        },
    };
    let colored = palette.apply(&intensity);

    let interpolation = Interpolation::from_index(config.interpolation_index).unwrap_or_else(|| {
        warn!(
            interpolation_index = config.interpolation_index,
            "Invalid interpolation index, using linear"
        );
        Interpolation::Linear
    });
    let recordable = resize(&colored, config.scale_percent, interpolation);

    PipelineOutput {
        intensity,
        recordable,
        palette,
        palette_fallback,
    }
}
