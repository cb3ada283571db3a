//! False-colour palettes
//!
//! Each palette is a 256-entry lookup table built from a handful of colour
//! stops. The stops approximate the familiar scientific colormaps closely
//! enough for thermal viewing; exact reproduction is not a goal.

use crate::util::{hsv_to_rgb, sample_stops, Rgb};
use image::{GrayImage, Rgb as Pixel, RgbImage};

/// Palette selector, in the order the palette key cycles through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Palette {
    #[default]
    Inferno,
    Autumn,
    Bone,
    Cividis,
    Cool,
    DeepGreen,
    Hot,
    Hsv,
    Jet,
    Magma,
    Ocean,
    Parula,
    Pink,
    Plasma,
    Rainbow,
    Spring,
    Summer,
    Turbo,
    Twilight,
    TwilightShifted,
    Viridis,
    Winter,
}

impl Palette {
    pub const COUNT: usize = 22;

    pub const ALL: [Palette; Self::COUNT] = [
        Palette::Inferno,
        Palette::Autumn,
        Palette::Bone,
        Palette::Cividis,
        Palette::Cool,
        Palette::DeepGreen,
        Palette::Hot,
        Palette::Hsv,
        Palette::Jet,
        Palette::Magma,
        Palette::Ocean,
        Palette::Parula,
        Palette::Pink,
        Palette::Plasma,
        Palette::Rainbow,
        Palette::Spring,
        Palette::Summer,
        Palette::Turbo,
        Palette::Twilight,
        Palette::TwilightShifted,
        Palette::Viridis,
        Palette::Winter,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Palette::Inferno => "Inferno",
            Palette::Autumn => "Autumn",
            Palette::Bone => "Bone",
            Palette::Cividis => "Cividis",
            Palette::Cool => "Cool",
            Palette::DeepGreen => "Deep green",
            Palette::Hot => "Hot",
            Palette::Hsv => "HSV",
            Palette::Jet => "Jet",
            Palette::Magma => "Magma",
            Palette::Ocean => "Ocean",
            Palette::Parula => "Parula",
            Palette::Pink => "Pink",
            Palette::Plasma => "Plasma",
            Palette::Rainbow => "Rainbow",
            Palette::Spring => "Spring",
            Palette::Summer => "Summer",
            Palette::Turbo => "Turbo",
            Palette::Twilight => "Twilight",
            Palette::TwilightShifted => "Twilight shifted",
            Palette::Viridis => "Viridis",
            Palette::Winter => "Winter",
        }
    }

    fn stops(&self) -> &'static [Rgb] {
        match self {
            Palette::Inferno => &[
                [0, 0, 4],
                [40, 11, 84],
                [101, 21, 110],
                [159, 42, 99],
                [212, 72, 66],
                [245, 125, 21],
                [250, 193, 39],
                [252, 255, 164],
            ],
            Palette::Autumn => &[[255, 0, 0], [255, 255, 0]],
            Palette::Bone => &[[0, 0, 0], [84, 84, 116], [167, 199, 199], [255, 255, 255]],
            Palette::Cividis => &[
                [0, 32, 77],
                [62, 77, 108],
                [124, 123, 120],
                [188, 175, 111],
                [253, 234, 69],
            ],
            Palette::Cool => &[[0, 255, 255], [255, 0, 255]],
            Palette::DeepGreen => &[
                [1, 1, 1],
                [8, 53, 30],
                [23, 107, 64],
                [76, 166, 79],
                [167, 216, 112],
                [255, 255, 255],
            ],
            Palette::Hot => &[[0, 0, 0], [255, 0, 0], [255, 255, 0], [255, 255, 255]],
            // Generated from the hue wheel in `color`
            Palette::Hsv => &[],
            Palette::Jet => &[
                [0, 0, 128],
                [0, 0, 255],
                [0, 255, 255],
                [255, 255, 0],
                [255, 0, 0],
                [128, 0, 0],
            ],
            Palette::Magma => &[
                [0, 0, 4],
                [28, 16, 68],
                [79, 18, 123],
                [129, 37, 129],
                [181, 54, 122],
                [229, 80, 100],
                [251, 135, 97],
                [254, 194, 135],
                [252, 253, 191],
            ],
            Palette::Ocean => &[[0, 128, 0], [0, 0, 85], [0, 128, 170], [255, 255, 255]],
            Palette::Parula => &[
                [53, 42, 135],
                [3, 99, 225],
                [20, 132, 212],
                [6, 167, 198],
                [56, 185, 158],
                [146, 191, 115],
                [225, 185, 82],
                [252, 206, 46],
                [249, 251, 14],
            ],
            Palette::Pink => &[[30, 0, 0], [166, 106, 106], [216, 216, 159], [255, 255, 255]],
            Palette::Plasma => &[
                [13, 8, 135],
                [84, 2, 163],
                [139, 10, 165],
                [185, 50, 137],
                [219, 92, 104],
                [244, 136, 73],
                [254, 188, 43],
                [240, 249, 33],
            ],
            Palette::Rainbow => &[
                [255, 0, 0],
                [255, 255, 0],
                [0, 255, 0],
                [0, 255, 255],
                [0, 0, 255],
                [128, 0, 255],
            ],
            Palette::Spring => &[[255, 0, 255], [255, 255, 0]],
            Palette::Summer => &[[0, 128, 102], [255, 255, 102]],
            Palette::Turbo => &[
                [48, 18, 59],
                [70, 131, 249],
                [27, 229, 181],
                [164, 252, 59],
                [251, 185, 56],
                [227, 81, 15],
                [122, 4, 3],
            ],
            Palette::Twilight => &[
                [226, 217, 226],
                [97, 124, 189],
                [47, 20, 67],
                [167, 64, 66],
                [226, 217, 226],
            ],
            Palette::TwilightShifted => &[
                [47, 20, 67],
                [97, 124, 189],
                [226, 217, 226],
                [167, 64, 66],
                [47, 20, 67],
            ],
            Palette::Viridis => &[
                [68, 1, 84],
                [72, 40, 120],
                [62, 74, 137],
                [49, 104, 142],
                [38, 130, 142],
                [31, 158, 137],
                [53, 183, 121],
                [109, 205, 89],
                [180, 222, 44],
                [253, 231, 37],
            ],
            Palette::Winter => &[[0, 0, 255], [0, 255, 128]],
        }
    }

    /// Build the 256-entry lookup table
    pub fn lut(&self) -> [Rgb; 256] {
        let mut table = [[0u8; 3]; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = self.color(i as u8);
        }
        table
    }

    pub fn color(&self, value: u8) -> Rgb {
        let t = f32::from(value) / 255.0;
        match self {
            Palette::Hsv => hsv_to_rgb(t * 360.0, 1.0, 1.0),
            _ => sample_stops(self.stops(), t),
        }
    }

    /// Map every intensity through the palette
    pub fn apply(&self, intensity: &GrayImage) -> RgbImage {
        let table = self.lut();
        let (width, height) = intensity.dimensions();
        RgbImage::from_fn(width, height, |x, y| {
            Pixel(table[usize::from(intensity.get_pixel(x, y)[0])])
        })
    }
}
