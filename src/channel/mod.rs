//! Boundary to the external channel component.
//!
//! The channel owns the transport, the callback threads and the buffer pool
//! that backs every delivered frame. This crate only talks to it through the
//! traits below:
//!
//! - [`CallbackBufferPool`]: reserve / release the buffer behind a frame
//! - [`FrameChannel`]: register isolated callbacks and start streams
//! - [`ChannelControl`]: sensor queries and image configuration used at startup
//!
//! [`MockChannel`] implements all three without hardware.

mod device;
mod group_id;
mod mock;

pub use device::{DeviceInfo, DeviceMode, ImageConfig, ImagerKind, TriggerSource};
pub use group_id::GroupId;
pub use mock::{MockChannel, PoolStats};

use std::fmt;
use std::sync::Arc;

use crate::error::PoolError;
use crate::frame::{FrameHeader, SourceMask};

/// Status code returned by a failed channel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelStatus(pub i32);

impl ChannelStatus {
    /// Generic failure.
    pub const FAILED: ChannelStatus = ChannelStatus(-1);
    /// The sensor did not answer in time.
    pub const TIMEOUT: ChannelStatus = ChannelStatus(-2);
    /// The request is not supported by this sensor.
    pub const UNSUPPORTED: ChannelStatus = ChannelStatus(-3);
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// Opaque reservation token handed out by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferToken(pub u64);

impl fmt::Display for BufferToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback invoked by the channel for every frame matching its source mask.
///
/// The channel runs each registered callback on a thread it owns and
/// serializes calls to one callback; different callbacks run concurrently.
pub type FrameCallback = Arc<dyn Fn(&FrameHeader) + Send + Sync>;

/// Pool of buffers backing delivered frames.
///
/// Every successful reservation must be paired with exactly one release.
/// [`BufferHandle`](crate::BufferHandle) enforces this on the crate side.
pub trait CallbackBufferPool: Send + Sync {
    /// Reserves the buffer backing `header`, the frame currently being delivered
    /// to the calling callback. Without a reservation the channel reuses the
    /// buffer as soon as the callback returns.
    fn reserve_callback_buffer(&self, header: &FrameHeader) -> Result<BufferToken, PoolError>;

    /// Returns a reserved buffer to the pool.
    fn release_callback_buffer(&self, token: BufferToken) -> Result<(), PoolError>;
}

/// Frame delivery side of the channel.
pub trait FrameChannel: CallbackBufferPool {
    /// Registers `callback` to run on a dedicated channel thread for frames
    /// whose source is in `mask`.
    fn add_isolated_callback(
        &self,
        callback: FrameCallback,
        mask: SourceMask,
    ) -> Result<(), ChannelStatus>;

    /// Starts streaming the sources in `mask`.
    fn start_streams(&self, mask: SourceMask) -> Result<(), ChannelStatus>;
}

/// Sensor query and configuration calls used during startup.
pub trait ChannelControl: Send + Sync {
    /// Static device information.
    fn device_info(&self) -> Result<DeviceInfo, ChannelStatus>;

    /// Operating modes the sensor supports.
    fn device_modes(&self) -> Result<Vec<DeviceMode>, ChannelStatus>;

    /// Current image configuration.
    fn image_config(&self) -> Result<ImageConfig, ChannelStatus>;

    /// Writes an image configuration.
    fn set_image_config(&self, config: &ImageConfig) -> Result<(), ChannelStatus>;

    /// Sets the network MTU in bytes.
    fn set_mtu(&self, mtu: u32) -> Result<(), ChannelStatus>;

    /// Selects the capture trigger.
    fn set_trigger_source(&self, trigger: TriggerSource) -> Result<(), ChannelStatus>;
}
