//! Mock channel for testing without a sensor.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{
    BufferToken, CallbackBufferPool, ChannelControl, ChannelStatus, DeviceInfo, DeviceMode,
    FrameCallback, FrameChannel, ImageConfig, TriggerSource,
};
use crate::error::PoolError;
use crate::frame::{DataSource, FrameHeader, SourceMask};

/// Counters of the mock buffer pool.
///
/// `reserved == released + held` holds at every observation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Successful reservations.
    pub reserved: usize,
    /// Successful releases.
    pub released: usize,
    /// Reservations currently outstanding.
    pub held: usize,
}

#[derive(Default)]
struct PoolState {
    next_token: u64,
    held: HashMap<BufferToken, (DataSource, i64)>,
    reserved: usize,
    released: usize,
    fail_next_reserve: bool,
    /// Successful releases left before one fails.
    release_failure_in: Option<usize>,
}

struct DeviceState {
    info: DeviceInfo,
    modes: Vec<DeviceMode>,
    image_config: ImageConfig,
    mtu: Option<u32>,
    trigger: TriggerSource,
    failures: HashMap<&'static str, ChannelStatus>,
}

/// A channel that delivers frames on the caller's thread, for tests and demos.
///
/// The pool is instrumented so leak and double-release checks are one call
/// away, and every setup call can be made to fail with a chosen status.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stereo_sync::{DataSource, MockChannel, StereoSync};
///
/// let channel = Arc::new(MockChannel::new());
/// let session = StereoSync::builder()
///     .add_single("disparity", DataSource::Disparity)
///     .start(channel.clone())
///     .unwrap();
///
/// channel.deliver(&MockChannel::synthetic_frame(DataSource::Disparity, 0, 8, 4));
///
/// let latest = session.accessor().latest_single(DataSource::Disparity).unwrap();
/// assert_eq!(latest.frame_id, 0);
/// assert_eq!(channel.pool_stats().held, 1);
/// ```
pub struct MockChannel {
    pool: Mutex<PoolState>,
    callbacks: Mutex<Vec<(FrameCallback, SourceMask)>>,
    streaming: Mutex<SourceMask>,
    device: Mutex<DeviceState>,
}

impl MockChannel {
    /// Creates a mock colour sensor with the default modes.
    pub fn new() -> Self {
        Self {
            pool: Mutex::new(PoolState::default()),
            callbacks: Mutex::new(Vec::new()),
            streaming: Mutex::new(SourceMask::empty()),
            device: Mutex::new(DeviceState {
                info: DeviceInfo::default(),
                modes: Self::default_modes(),
                image_config: ImageConfig::default(),
                mtu: None,
                trigger: TriggerSource::Internal,
                failures: HashMap::new(),
            }),
        }
    }

    /// Replaces the reported device information.
    #[must_use]
    pub fn with_device_info(self, info: DeviceInfo) -> Self {
        self.device.lock().info = info;
        self
    }

    /// Replaces the reported device modes.
    #[must_use]
    pub fn with_device_modes(self, modes: Vec<DeviceMode>) -> Self {
        self.device.lock().modes = modes;
        self
    }

    /// Makes every call to `operation` fail with `status`.
    ///
    /// Operation names match the trait method names, e.g. `"set_mtu"`.
    #[must_use]
    pub fn with_failure(self, operation: &'static str, status: ChannelStatus) -> Self {
        self.device.lock().failures.insert(operation, status);
        self
    }

    /// Makes the next reservation fail.
    pub fn fail_next_reserve(&self) {
        self.pool.lock().fail_next_reserve = true;
    }

    /// Makes the next release fail. The buffer stays reserved.
    pub fn fail_next_release(&self) {
        self.fail_release_after(0);
    }

    /// Lets `successes` releases through, then fails the one after.
    pub fn fail_release_after(&self, successes: usize) {
        self.pool.lock().release_failure_in = Some(successes);
    }

    /// Snapshot of the pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        let pool = self.pool.lock();
        PoolStats {
            reserved: pool.reserved,
            released: pool.released,
            held: pool.held.len(),
        }
    }

    /// Sources started through [`FrameChannel::start_streams`].
    pub fn streaming(&self) -> SourceMask {
        *self.streaming.lock()
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// The image configuration last written.
    pub fn applied_image_config(&self) -> ImageConfig {
        self.device.lock().image_config
    }

    /// The MTU last set, if any.
    pub fn mtu(&self) -> Option<u32> {
        self.device.lock().mtu
    }

    /// The trigger source last set.
    pub fn trigger(&self) -> TriggerSource {
        self.device.lock().trigger
    }

    /// Invokes every callback whose mask contains the frame's source, on the
    /// calling thread. Returns the number of callbacks invoked.
    ///
    /// Callbacks are invoked outside the registry lock, so they may reserve
    /// and release buffers freely.
    pub fn deliver(&self, header: &FrameHeader) -> usize {
        let targets: Vec<FrameCallback> = self
            .callbacks
            .lock()
            .iter()
            .filter(|(_, mask)| mask.contains(header.source))
            .map(|(callback, _)| callback.clone())
            .collect();

        for callback in &targets {
            callback(header);
        }
        targets.len()
    }

    /// Builds a frame with deterministic pixel data.
    ///
    /// Depth follows the source: 16 bits for disparity and chroma, 8 for luma
    /// and matching cost.
    pub fn synthetic_frame(source: DataSource, frame_id: i64, width: u32, height: u32) -> FrameHeader {
        let bits_per_pixel: u32 = match source {
            DataSource::Disparity | DataSource::ChromaLeft | DataSource::ChromaRight => 16,
            DataSource::LumaLeft | DataSource::LumaRight | DataSource::DisparityCost => 8,
        };
        let len = (width as usize * height as usize * bits_per_pixel as usize).div_ceil(8);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let seed = frame_id as u8;
        #[allow(clippy::cast_possible_truncation)]
        let data: Vec<u8> = (0..len)
            .map(|i| seed.wrapping_add((i % 251) as u8))
            .collect();

        FrameHeader::new(source, frame_id, width, height, bits_per_pixel, data)
    }

    fn default_modes() -> Vec<DeviceMode> {
        let all: SourceMask = DataSource::ALL.into_iter().collect();
        vec![
            DeviceMode {
                width: 2048,
                height: 1088,
                supported_sources: all,
            },
            DeviceMode {
                width: 1024,
                height: 544,
                supported_sources: all,
            },
            DeviceMode {
                width: 512,
                height: 256,
                supported_sources: DataSource::LumaLeft
                    | DataSource::LumaRight
                    | DataSource::Disparity,
            },
        ]
    }

    fn check(&self, operation: &'static str) -> Result<(), ChannelStatus> {
        match self.device.lock().failures.get(operation) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackBufferPool for MockChannel {
    fn reserve_callback_buffer(&self, header: &FrameHeader) -> Result<BufferToken, PoolError> {
        let mut pool = self.pool.lock();
        if std::mem::take(&mut pool.fail_next_reserve) {
            return Err(PoolError::ReserveFailed {
                status: ChannelStatus::FAILED,
            });
        }

        let token = BufferToken(pool.next_token);
        pool.next_token += 1;
        pool.held.insert(token, (header.source, header.frame_id));
        pool.reserved += 1;
        Ok(token)
    }

    fn release_callback_buffer(&self, token: BufferToken) -> Result<(), PoolError> {
        let mut pool = self.pool.lock();
        if !pool.held.contains_key(&token) {
            return Err(PoolError::UnknownToken { token });
        }
        match pool.release_failure_in {
            Some(0) => {
                pool.release_failure_in = None;
                return Err(PoolError::ReleaseFailed {
                    token,
                    status: ChannelStatus::FAILED,
                });
            }
            Some(left) => pool.release_failure_in = Some(left - 1),
            None => {}
        }

        pool.held.remove(&token);
        pool.released += 1;
        Ok(())
    }
}

impl FrameChannel for MockChannel {
    fn add_isolated_callback(
        &self,
        callback: FrameCallback,
        mask: SourceMask,
    ) -> Result<(), ChannelStatus> {
        self.check("add_isolated_callback")?;
        self.callbacks.lock().push((callback, mask));
        Ok(())
    }

    fn start_streams(&self, mask: SourceMask) -> Result<(), ChannelStatus> {
        self.check("start_streams")?;
        *self.streaming.lock() |= mask;
        Ok(())
    }
}

impl ChannelControl for MockChannel {
    fn device_info(&self) -> Result<DeviceInfo, ChannelStatus> {
        self.check("device_info")?;
        Ok(self.device.lock().info.clone())
    }

    fn device_modes(&self) -> Result<Vec<DeviceMode>, ChannelStatus> {
        self.check("device_modes")?;
        Ok(self.device.lock().modes.clone())
    }

    fn image_config(&self) -> Result<ImageConfig, ChannelStatus> {
        self.check("image_config")?;
        Ok(self.device.lock().image_config)
    }

    fn set_image_config(&self, config: &ImageConfig) -> Result<(), ChannelStatus> {
        self.check("set_image_config")?;
        self.device.lock().image_config = *config;
        Ok(())
    }

    fn set_mtu(&self, mtu: u32) -> Result<(), ChannelStatus> {
        self.check("set_mtu")?;
        self.device.lock().mtu = Some(mtu);
        Ok(())
    }

    fn set_trigger_source(&self, trigger: TriggerSource) -> Result<(), ChannelStatus> {
        self.check("set_trigger_source")?;
        self.device.lock().trigger = trigger;
        Ok(())
    }
}
