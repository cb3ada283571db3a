//! Geometric stages: rotation and resize

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// Sensor orientation, in the order the rotate key cycles through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Identity,
    Cw90,
    Rotate180,
    Ccw90,
}

impl Rotation {
    pub const COUNT: usize = 4;

    const ALL: [Rotation; Self::COUNT] = [
        Rotation::Identity,
        Rotation::Cw90,
        Rotation::Rotate180,
        Rotation::Ccw90,
    ];

    /// Total mapping; indices wrap
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::COUNT]
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Rotation::Identity => 0,
            Rotation::Cw90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Ccw90 => 270,
        }
    }

    pub fn apply(&self, frame: &GrayImage) -> GrayImage {
        match self {
            Rotation::Identity => frame.clone(),
            Rotation::Cw90 => imageops::rotate90(frame),
            Rotation::Rotate180 => imageops::rotate180(frame),
            Rotation::Ccw90 => imageops::rotate270(frame),
        }
    }
}

/// Resize kernel, in the order the interpolation key cycles through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Nearest,
    Cubic,
    Gaussian,
    Lanczos3,
}

impl Interpolation {
    pub const COUNT: usize = 5;

    const ALL: [Interpolation; Self::COUNT] = [
        Interpolation::Linear,
        Interpolation::Nearest,
        Interpolation::Cubic,
        Interpolation::Gaussian,
        Interpolation::Lanczos3,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Interpolation::Linear => "Linear",
            Interpolation::Nearest => "Nearest",
            Interpolation::Cubic => "Cubic",
            Interpolation::Gaussian => "Gaussian",
            Interpolation::Lanczos3 => "Lanczos",
        }
    }

    fn filter(&self) -> FilterType {
        match self {
            Interpolation::Linear => FilterType::Triangle,
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Cubic => FilterType::CatmullRom,
            Interpolation::Gaussian => FilterType::Gaussian,
            Interpolation::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Output size for a magnification in percent; never zero on either axis
pub fn scaled_dimensions(width: u32, height: u32, scale_percent: u32) -> (u32, u32) {
    let scale = |d: u32| ((f64::from(d) * f64::from(scale_percent) / 100.0).round() as u32).max(1);
    (scale(width), scale(height))
}

pub fn resize(frame: &RgbImage, scale_percent: u32, interpolation: Interpolation) -> RgbImage {
    let (width, height) = scaled_dimensions(frame.width(), frame.height(), scale_percent);
    if (width, height) == frame.dimensions() {
        return frame.clone();
    }
    imageops::resize(frame, width, height, interpolation.filter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MAX_SCALE, MIN_SCALE, SCALE_STEP};
    use image::Luma;

    #[test]
    fn test_rotation_cycle_and_degrees() {
        assert_eq!(Rotation::from_index(0), Rotation::Identity);
        assert_eq!(Rotation::from_index(1).degrees(), 90);
        assert_eq!(Rotation::from_index(4), Rotation::Identity);
        assert_eq!(Rotation::from_index(7), Rotation::Ccw90);
    }

    #[test]
    fn test_rotation_moves_pixels() {
        // 3x2 image with a marker in the top-left corner
        let mut frame = GrayImage::new(3, 2);
        frame.put_pixel(0, 0, Luma([200]));

        let cw = Rotation::Cw90.apply(&frame);
        assert_eq!(cw.dimensions(), (2, 3));
        assert_eq!(cw.get_pixel(1, 0)[0], 200, "top-left goes to top-right");

        let half = Rotation::Rotate180.apply(&frame);
        assert_eq!(half.get_pixel(2, 1)[0], 200);

        let ccw = Rotation::Ccw90.apply(&frame);
        assert_eq!(ccw.get_pixel(0, 2)[0], 200, "top-left goes to bottom-left");

        assert_eq!(Rotation::Identity.apply(&frame), frame);
    }

    #[test]
    fn test_interpolation_lookup() {
        assert_eq!(Interpolation::from_index(0), Some(Interpolation::Linear));
        assert_eq!(Interpolation::from_index(Interpolation::COUNT), None);
    }

    #[test]
    fn test_scaled_dimensions_never_zero() {
        let mut scale = MIN_SCALE;
        while scale <= MAX_SCALE {
            let (w, h) = scaled_dimensions(1, 1, scale);
            assert!(w >= 1 && h >= 1, "zero size at {}%", scale);
            scale += SCALE_STEP;
        }
        assert_eq!(scaled_dimensions(0, 5, 100), (1, 5));
        assert_eq!(scaled_dimensions(256, 192, 600), (1536, 1152));
        assert_eq!(scaled_dimensions(3, 3, 150), (5, 5), "4.5 rounds up");
    }

    #[test]
    fn test_resize_output_size() {
        let frame = RgbImage::new(4, 2);
        for interpolation in Interpolation::ALL {
            let out = resize(&frame, 250, interpolation);
            assert_eq!(out.dimensions(), (10, 5));
        }
    }
}
