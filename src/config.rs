//! Configuration types for synchronization and sensor setup.

use crate::channel::TriggerSource;

/// Whether paired groups wait for a matching partner frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingMode {
    /// Publish a pair only when both sources carry the same frame id.
    #[default]
    Paired,

    /// The partner source does not exist (monochrome imager). Every frame from
    /// the primary source is published immediately.
    Unpaired,
}

/// Configuration for synchronization behavior.
///
/// Use [`SyncConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use stereo_sync::{PairingMode, SyncConfig};
///
/// let config = SyncConfig {
///     pairing: PairingMode::Unpaired,
///     ..Default::default()
/// };
/// assert!(config.strict_frame_order);
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pairing mode applied to every pair group.
    ///
    /// Default: [`PairingMode::Paired`]
    pub pairing: PairingMode,

    /// Treat a frame id lower than the previous one from the same source as a
    /// fatal [`FrameIdRegressed`] error.
    ///
    /// Default: true
    ///
    /// [`FrameIdRegressed`]: crate::StereoSyncError::FrameIdRegressed
    pub strict_frame_order: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pairing: PairingMode::Paired,
            strict_frame_order: true,
        }
    }
}

/// Requested sensor settings applied by [`configure_sensor`](crate::configure_sensor).
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    /// Requested output width; the closest supported mode is used.
    ///
    /// Default: 1024
    pub width: u32,

    /// Requested output height; the closest supported mode is used.
    ///
    /// Default: 512
    pub height: u32,

    /// Frames per second.
    ///
    /// Default: 30.0
    pub fps: f32,

    /// Network MTU in bytes. Best-effort; `None` leaves the sensor default.
    ///
    /// Default: 7200 (jumbo frames)
    pub mtu: Option<u32>,

    /// Capture trigger. Best-effort.
    ///
    /// Default: [`TriggerSource::Internal`]
    pub trigger: TriggerSource,

    /// Auto-exposure threshold, 0.0 to 1.0. Best-effort; `None` leaves the
    /// sensor default.
    ///
    /// Default: None
    pub exposure_threshold: Option<f32>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 512,
            fps: 30.0,
            mtu: Some(7200),
            trigger: TriggerSource::Internal,
            exposure_threshold: None,
        }
    }
}
