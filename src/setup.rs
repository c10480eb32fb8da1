//! Sensor configuration applied before streaming starts.
//!
//! Resolution and frame rate must be applied for the session to make sense, so
//! failures there are fatal. MTU, trigger source and exposure threshold are
//! tuning: a failure is logged, reported as [`SyncEvent::ConfigWarning`] and
//! startup continues.

use crate::channel::{ChannelControl, ChannelStatus, DeviceInfo, DeviceMode, ImagerKind};
use crate::config::{PairingMode, SensorConfig};
use crate::error::StereoSyncError;
use crate::event::{EventCallback, SyncEvent};
use crate::frame::{DataSource, SourceMask};

/// Outcome of [`configure_sensor`].
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSetup {
    /// Information reported by the sensor.
    pub device: DeviceInfo,
    /// Width of the selected mode.
    pub width: u32,
    /// Height of the selected mode.
    pub height: u32,
    /// Pairing mode to pass to [`StereoSyncBuilder::pairing`](crate::StereoSyncBuilder::pairing).
    pub pairing: PairingMode,
    /// Sources the selected mode must stream.
    pub required_sources: SourceMask,
}

/// Picks the mode closest to the requested resolution among those that stream
/// every required source.
///
/// Distance is `|Δwidth| + |Δheight|`; the first mode wins a tie.
///
/// # Example
///
/// ```
/// use stereo_sync::{select_device_mode, DataSource, DeviceMode};
///
/// let all = DataSource::LumaLeft | DataSource::Disparity;
/// let modes = [
///     DeviceMode { width: 2048, height: 1088, supported_sources: all },
///     DeviceMode { width: 1024, height: 544, supported_sources: all },
/// ];
///
/// let mode = select_device_mode(&modes, 1000, 500, all).unwrap();
/// assert_eq!((mode.width, mode.height), (1024, 544));
/// ```
///
/// # Errors
///
/// `NoSuitableDeviceMode` if no mode supports `required`.
pub fn select_device_mode(
    modes: &[DeviceMode],
    width: u32,
    height: u32,
    required: SourceMask,
) -> Result<DeviceMode, StereoSyncError> {
    let distance = |mode: &DeviceMode| {
        (i64::from(mode.width) - i64::from(width)).abs()
            + (i64::from(mode.height) - i64::from(height)).abs()
    };

    let mut best: Option<(i64, DeviceMode)> = None;
    for mode in modes.iter().filter(|m| m.supported_sources.contains_all(required)) {
        let d = distance(mode);
        if best.map_or(true, |(best_d, _)| d < best_d) {
            best = Some((d, *mode));
        }
    }

    best.map(|(_, mode)| mode)
        .ok_or(StereoSyncError::NoSuitableDeviceMode { required })
}

/// Queries the sensor, selects a mode and applies `config`.
///
/// A monochrome imager has no chroma plane, so it only requires left luma and
/// disparity and selects [`PairingMode::Unpaired`]. A colour imager also
/// requires left chroma and selects [`PairingMode::Paired`].
///
/// # Errors
///
/// `Protocol` if the device info, mode list or image configuration calls
/// fail, `NoSuitableDeviceMode` if no mode streams the required sources.
pub fn configure_sensor<C>(
    control: &C,
    config: &SensorConfig,
    events: Option<&EventCallback>,
) -> Result<SensorSetup, StereoSyncError>
where
    C: ChannelControl + ?Sized,
{
    let device = control
        .device_info()
        .map_err(StereoSyncError::protocol("device_info"))?;

    let (required_sources, pairing) = match device.imager_kind {
        ImagerKind::Grey => (DataSource::Disparity | DataSource::LumaLeft, PairingMode::Unpaired),
        ImagerKind::Color => (
            DataSource::Disparity | DataSource::LumaLeft | DataSource::ChromaLeft,
            PairingMode::Paired,
        ),
    };
    tracing::info!(
        device = %device.name,
        imager = ?device.imager_kind,
        required = %required_sources,
        "sensor identified"
    );

    let modes = control
        .device_modes()
        .map_err(StereoSyncError::protocol("device_modes"))?;
    let mode = select_device_mode(&modes, config.width, config.height, required_sources)?;

    let mut image = control
        .image_config()
        .map_err(StereoSyncError::protocol("image_config"))?;
    image.width = mode.width;
    image.height = mode.height;
    image.fps = config.fps;
    control
        .set_image_config(&image)
        .map_err(StereoSyncError::protocol("set_image_config"))?;
    tracing::info!(width = mode.width, height = mode.height, fps = config.fps, "resolution applied");

    let warn = |setting: &'static str, status: ChannelStatus| {
        tracing::warn!(setting, %status, "could not apply sensor setting");
        if let Some(callback) = events {
            callback(SyncEvent::ConfigWarning { setting, status });
        }
    };

    if let Some(mtu) = config.mtu {
        if let Err(status) = control.set_mtu(mtu) {
            warn("mtu", status);
        }
    }

    if let Err(status) = control.set_trigger_source(config.trigger) {
        warn("trigger_source", status);
    }

    if let Some(threshold) = config.exposure_threshold {
        let applied = control.image_config().and_then(|mut image| {
            image.auto_exposure_threshold = threshold;
            control.set_image_config(&image)
        });
        if let Err(status) = applied {
            warn("auto_exposure_threshold", status);
        }
    }

    Ok(SensorSetup {
        device,
        width: mode.width,
        height: mode.height,
        pairing,
        required_sources,
    })
}
