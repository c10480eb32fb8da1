//! Sensor description and image configuration types exchanged with the channel.

use crate::frame::SourceMask;

/// Kind of imager fitted to the sensor head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImagerKind {
    /// Colour imager: delivers luma and chroma planes.
    #[default]
    Color,
    /// Monochrome imager: luma only, no chroma partner.
    Grey,
}

/// Static information reported by the sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Model name, for logs.
    pub name: String,
    /// Full imager width in pixels.
    pub imager_width: u32,
    /// Full imager height in pixels.
    pub imager_height: u32,
    /// Colour or greyscale imager.
    pub imager_kind: ImagerKind,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            imager_width: 2048,
            imager_height: 1088,
            imager_kind: ImagerKind::Color,
        }
    }
}

/// An operating mode the sensor supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceMode {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Sources that can stream in this mode.
    pub supported_sources: SourceMask,
}

/// How image capture is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerSource {
    /// Free-running on the sensor's own clock.
    #[default]
    Internal,
    /// Driven by an external trigger line.
    External,
}

/// Image configuration read from and written back to the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: f32,
    /// Auto-exposure threshold, 0.0 to 1.0.
    pub auto_exposure_threshold: f32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 544,
            fps: 10.0,
            auto_exposure_threshold: 0.75,
        }
    }
}
