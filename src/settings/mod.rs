//! Persistent viewer configuration
//!
//! The configuration is a flat JSON object. Known keys are validated and
//! normalised on the way in; comment keys and anything we do not recognise
//! are carried along untouched so hand-edited files keep their notes.

mod store;

pub use store::SettingsStore;

use crate::pipeline::{Interpolation, Palette, Rotation};
use serde_json::{Map, Value};
use std::fmt;

pub const MIN_SCALE: u32 = 150;
pub const MAX_SCALE: u32 = 1000;
pub const SCALE_STEP: u32 = 50;

pub const KEY_CAMERA_SOURCE: &str = "camera_source";
pub const KEY_ROTATION: &str = "rotation_index";
pub const KEY_MAP: &str = "map_index";
pub const KEY_INTERPOLATION: &str = "interpolation_index";
pub const KEY_SCALE: &str = "scale_percent";

const DEFAULT_CAMERA_INDEX: u32 = 0;
const DEFAULT_ROTATION: usize = 1;
const DEFAULT_MAP: usize = 0;
const DEFAULT_INTERPOLATION: usize = 0;
const DEFAULT_SCALE: u32 = 600;

const DEFAULT_COMMENTS: [(&str, &str); 3] = [
    (
        "_comment_1",
        "camera_source selects the thermal camera.",
    ),
    (
        "_comment_2",
        "Use a numeric index (0 opens /dev/video0, 1 opens /dev/video1, ...).",
    ),
    (
        "_comment_3",
        "Or a device path such as /dev/v4l/by-id/usb-GW192A_Thermal_Camera-video-index0.",
    ),
];

/// Where frames come from: a V4L2 device index or an explicit device path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    Index(u32),
    Path(String),
}

impl CameraSource {
    /// Interpret a JSON value; digit-only strings are indices
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(CameraSource::Index),
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => match s.parse::<u32>() {
                Ok(index) if s.bytes().all(|b| b.is_ascii_digit()) => {
                    Some(CameraSource::Index(index))
                },
                _ => Some(CameraSource::Path(s.clone())),
            },
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            CameraSource::Index(index) => Value::from(*index),
            CameraSource::Path(path) => Value::from(path.as_str()),
        }
    }
}

impl Default for CameraSource {
    fn default() -> Self {
        CameraSource::Index(DEFAULT_CAMERA_INDEX)
    }
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSource::Index(index) => write!(f, "/dev/video{}", index),
            CameraSource::Path(path) => f.write_str(path),
        }
    }
}

/// A single persisted field change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Rotation(usize),
    Palette(usize),
    Interpolation(usize),
    Scale(u32),
}

impl Setting {
    pub fn key(&self) -> &'static str {
        match self {
            Setting::Rotation(_) => KEY_ROTATION,
            Setting::Palette(_) => KEY_MAP,
            Setting::Interpolation(_) => KEY_INTERPOLATION,
            Setting::Scale(_) => KEY_SCALE,
        }
    }
}

/// Live configuration. Index fields are always inside their domain and the
/// scale is always inside `[MIN_SCALE, MAX_SCALE]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub camera_source: CameraSource,
    pub rotation_index: usize,
    pub map_index: usize,
    pub interpolation_index: usize,
    pub scale_percent: u32,
    /// The document as read, including comment and unknown keys
    document: Map<String, Value>,
}

impl Default for Configuration {
    fn default() -> Self {
        let mut document = Map::new();
        for (key, text) in DEFAULT_COMMENTS {
            document.insert(key.to_string(), Value::from(text));
        }
        let mut config = Self {
            camera_source: CameraSource::default(),
            rotation_index: DEFAULT_ROTATION,
            map_index: DEFAULT_MAP,
            interpolation_index: DEFAULT_INTERPOLATION,
            scale_percent: DEFAULT_SCALE,
            document,
        };
        config.sync_document();
        config
    }
}

/// Clamp into the zoom range and snap to the zoom step grid
pub fn normalize_scale(value: i64) -> u32 {
    let clamped = value.clamp(i64::from(MIN_SCALE), i64::from(MAX_SCALE));
    let steps = ((clamped - i64::from(MIN_SCALE)) as f64 / f64::from(SCALE_STEP)).round() as i64;
    let snapped = i64::from(MIN_SCALE) + steps * i64::from(SCALE_STEP);
    snapped.min(i64::from(MAX_SCALE)) as u32
}

fn wrap_index(value: i64, cardinality: usize) -> usize {
    value.rem_euclid(cardinality as i64) as usize
}

fn integer(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value.as_i64().or_else(|| {
        // Large positive values still count as integers
        value.as_u64().map(|_| i64::MAX)
    })
}

impl Configuration {
    /// Merge a parsed document with the defaults.
    ///
    /// Returns the configuration and the keys that had to be repaired
    /// (missing, wrongly typed, or out of range).
    pub fn from_document(document: Map<String, Value>) -> (Self, Vec<&'static str>) {
        let defaults = Configuration::default();
        let mut repaired = Vec::new();

        let camera_source = match document
            .get(KEY_CAMERA_SOURCE)
            .and_then(CameraSource::from_value)
        {
            Some(source) => source,
            None => {
                repaired.push(KEY_CAMERA_SOURCE);
                defaults.camera_source.clone()
            },
        };

        let mut index_field = |key: &'static str, cardinality: usize, default: usize| {
            match integer(document.get(key)) {
                Some(raw) => {
                    let wrapped = wrap_index(raw, cardinality);
                    if raw != wrapped as i64 {
                        repaired.push(key);
                    }
                    wrapped
                },
                None => {
                    repaired.push(key);
                    default
                },
            }
        };

        let rotation_index = index_field(KEY_ROTATION, Rotation::COUNT, defaults.rotation_index);
        let map_index = index_field(KEY_MAP, Palette::COUNT, defaults.map_index);
        let interpolation_index = index_field(
            KEY_INTERPOLATION,
            Interpolation::COUNT,
            defaults.interpolation_index,
        );

        let scale_percent = match integer(document.get(KEY_SCALE)) {
            Some(raw) => {
                let normalized = normalize_scale(raw);
                if raw != i64::from(normalized) {
                    repaired.push(KEY_SCALE);
                }
                normalized
            },
            None => {
                repaired.push(KEY_SCALE);
                defaults.scale_percent
            },
        };

        let mut config = Self {
            camera_source,
            rotation_index,
            map_index,
            interpolation_index,
            scale_percent,
            document,
        };
        config.sync_document();
        (config, repaired)
    }

    /// Apply a field change, normalising it the same way `from_document` does
    pub fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::Rotation(value) => self.rotation_index = value % Rotation::COUNT,
            Setting::Palette(value) => self.map_index = value % Palette::COUNT,
            Setting::Interpolation(value) => {
                self.interpolation_index = value % Interpolation::COUNT;
            },
            Setting::Scale(value) => self.scale_percent = normalize_scale(i64::from(value)),
        }
        self.sync_document();
    }

    /// The JSON object that gets written to disk
    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Write typed fields back into the document, keeping key order
    fn sync_document(&mut self) {
        self.document
            .insert(KEY_CAMERA_SOURCE.to_string(), self.camera_source.to_value());
        self.document
            .insert(KEY_ROTATION.to_string(), Value::from(self.rotation_index));
        self.document
            .insert(KEY_MAP.to_string(), Value::from(self.map_index));
        self.document.insert(
            KEY_INTERPOLATION.to_string(),
            Value::from(self.interpolation_index),
        );
        self.document
            .insert(KEY_SCALE.to_string(), Value::from(self.scale_percent));
    }

    pub fn rotation(&self) -> Rotation {
        Rotation::from_index(self.rotation_index)
    }
}
