//! Format descriptors: Video timing and pixel layout.

use crate::error::StageError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Field order of a video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    /// Whole frames.
    #[default]
    Progressive,
    /// Interlaced, upper field first.
    Upper,
    /// Interlaced, lower field first.
    Lower,
}

impl FieldMode {
    /// Check whether the format is interlaced.
    #[inline]
    pub const fn is_interlaced(self) -> bool {
        !matches!(self, Self::Progressive)
    }

    /// Number of fields per frame.
    #[inline]
    pub const fn field_count(self) -> u32 {
        if self.is_interlaced() {
            2
        } else {
            1
        }
    }
}

/// Timing and resolution of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoFormatDesc {
    /// Format name (e.g. `1080i5000`).
    pub name: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Field order.
    pub field_mode: FieldMode,
    /// Frame rate numerator.
    pub time_scale: u32,
    /// Frame rate denominator.
    pub duration: u32,
    /// Audio sample rate in Hz.
    pub audio_sample_rate: u32,
}

/// Registered formats: name, width, height, field mode, time scale, duration.
const PRESETS: &[(&str, u32, u32, FieldMode, u32, u32)] = &[
    ("PAL", 720, 576, FieldMode::Upper, 25000, 1000),
    ("NTSC", 720, 486, FieldMode::Lower, 30000, 1001),
    ("576p2500", 720, 576, FieldMode::Progressive, 25000, 1000),
    ("720p2500", 1280, 720, FieldMode::Progressive, 25000, 1000),
    ("720p5000", 1280, 720, FieldMode::Progressive, 50000, 1000),
    ("720p5994", 1280, 720, FieldMode::Progressive, 60000, 1001),
    ("720p6000", 1280, 720, FieldMode::Progressive, 60000, 1000),
    ("1080p2398", 1920, 1080, FieldMode::Progressive, 24000, 1001),
    ("1080p2400", 1920, 1080, FieldMode::Progressive, 24000, 1000),
    ("1080i5000", 1920, 1080, FieldMode::Upper, 25000, 1000),
    ("1080i5994", 1920, 1080, FieldMode::Upper, 30000, 1001),
    ("1080i6000", 1920, 1080, FieldMode::Upper, 30000, 1000),
    ("1080p2500", 1920, 1080, FieldMode::Progressive, 25000, 1000),
    ("1080p2997", 1920, 1080, FieldMode::Progressive, 30000, 1001),
    ("1080p3000", 1920, 1080, FieldMode::Progressive, 30000, 1000),
    ("1080p5000", 1920, 1080, FieldMode::Progressive, 50000, 1000),
    ("1080p5994", 1920, 1080, FieldMode::Progressive, 60000, 1001),
    ("1080p6000", 1920, 1080, FieldMode::Progressive, 60000, 1000),
];

impl VideoFormatDesc {
    /// Look up a registered format by name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, StageError> {
        PRESETS
            .iter()
            .find(|preset| preset.0.eq_ignore_ascii_case(name))
            .map(|&(name, width, height, field_mode, time_scale, duration)| Self {
                name: name.to_string(),
                width,
                height,
                field_mode,
                time_scale,
                duration,
                audio_sample_rate: 48000,
            })
            .ok_or_else(|| StageError::UnknownFormat(name.to_string()))
    }

    /// Names of all registered formats.
    pub fn names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|preset| preset.0)
    }

    /// Frames per second.
    #[inline]
    pub fn fps(&self) -> f64 {
        f64::from(self.time_scale) / f64::from(self.duration)
    }

    /// Wall-clock time of one frame.
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(
            u64::from(self.duration) * 1_000_000_000 / u64::from(self.time_scale.max(1)),
        )
    }

    /// Audio samples per channel in one frame, rounded down.
    pub fn audio_samples_per_frame(&self) -> u32 {
        let samples =
            u64::from(self.audio_sample_rate) * u64::from(self.duration) / u64::from(self.time_scale);
        u32::try_from(samples).unwrap_or(u32::MAX)
    }

    /// Byte size of one BGRA frame.
    pub const fn size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl Default for VideoFormatDesc {
    fn default() -> Self {
        Self {
            name: "1080p5000".to_string(),
            width: 1920,
            height: 1080,
            field_mode: FieldMode::Progressive,
            time_scale: 50000,
            duration: 1000,
            audio_sample_rate: 48000,
        }
    }
}

impl FromStr for VideoFormatDesc {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl fmt::Display for VideoFormatDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Memory layout of a frame's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Single luma channel.
    Gray,
    /// Packed blue, green, red, alpha.
    #[default]
    Bgra,
    /// Packed red, green, blue, alpha.
    Rgba,
    /// Packed alpha, red, green, blue.
    Argb,
    /// Packed alpha, blue, green, red.
    Abgr,
    /// Planar luma and chroma.
    Ycbcr,
    /// Planar luma, chroma and alpha.
    Ycbcra,
}

/// One plane of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlaneDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per pixel.
    pub channels: u32,
}

impl PlaneDesc {
    /// Create a plane descriptor.
    #[inline]
    pub const fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Bytes per row.
    #[inline]
    pub const fn linesize(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Total bytes.
    #[inline]
    pub const fn size(&self) -> usize {
        self.linesize() * self.height as usize
    }
}

/// Pixel format plus plane layout, used to allocate frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct PixelFormatDesc {
    /// Pixel format.
    pub format: PixelFormat,
    /// Planes, in storage order.
    pub planes: Vec<PlaneDesc>,
}

impl PixelFormatDesc {
    /// Single packed BGRA plane.
    pub fn bgra(width: u32, height: u32) -> Self {
        Self {
            format: PixelFormat::Bgra,
            planes: vec![PlaneDesc::new(width, height, 4)],
        }
    }

    /// Total bytes across all planes.
    pub fn size(&self) -> usize {
        self.planes.iter().map(PlaneDesc::size).sum()
    }
}
