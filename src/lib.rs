//! # stereo-sync
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Frame synchronization for stereo camera channels.
//!
//! A stereo sensor streams several image planes (luma, chroma, disparity,
//! matching cost) over independent callbacks. `stereo-sync` keeps the latest
//! frame of each source reserved in the channel's buffer pool, pairs luma and
//! chroma by frame id so consumers never mix captures, and returns every buffer
//! exactly once.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use stereo_sync::{configure_sensor, DataSource, MockChannel, SensorConfig, StereoSync};
//!
//! # fn main() -> Result<(), stereo_sync::StereoSyncError> {
//! let channel = Arc::new(MockChannel::new());
//! let setup = configure_sensor(channel.as_ref(), &SensorConfig::default(), None)?;
//!
//! let session = StereoSync::builder()
//!     .add_pair("left", DataSource::LumaLeft, DataSource::ChromaLeft)
//!     .add_single("disparity", DataSource::Disparity)
//!     .pairing(setup.pairing)
//!     .on_event(|e| tracing::warn!(?e, "sync event"))
//!     .start(channel.clone())?;
//!
//! // The channel's threads deliver frames...
//! channel.deliver(&MockChannel::synthetic_frame(DataSource::LumaLeft, 0, 64, 32));
//! channel.deliver(&MockChannel::synthetic_frame(DataSource::ChromaLeft, 0, 64, 32));
//!
//! // ...and any thread reads the latest matched pair.
//! let pair = session.accessor().matched_pair("left").expect("pair published");
//! assert_eq!(pair.frame_id(), 0);
//!
//! session.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Channel threads**: one isolated callback per source-group, never
//!   blocked by consumers
//! - **Slots**: last-writer-wins, one reserved buffer each, each behind its
//!   own lock
//! - **Synchronizer**: pending slots per side, promoted together into the
//!   matched view when frame ids agree
//! - **Consumers**: copy headers out on demand, or await
//!   [`Session::subscribe`] notices
//!
//! Fatal contract breaches never unwind into the channel: the first one stops
//! the session and [`Session::run_until_shutdown`] returns it.

#![warn(missing_docs)]
// Pixel and counter code requires intentional numeric casts
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod accessor;
mod builder;
mod channel;
mod config;
mod error;
mod event;
pub mod format;
mod frame;
mod pipeline;
mod session;
mod setup;
mod slot;
mod store;

pub use accessor::FrameAccessor;
pub use builder::{StereoSync, StereoSyncBuilder};
pub use channel::{
    BufferToken, CallbackBufferPool, ChannelControl, ChannelStatus, DeviceInfo, DeviceMode,
    FrameCallback, FrameChannel, GroupId, ImageConfig, ImagerKind, MockChannel, PoolStats,
    TriggerSource,
};
pub use config::{PairingMode, SensorConfig, SyncConfig};
pub use error::{AccessError, PoolError, StereoSyncError};
pub use event::{event_callback, EventCallback, SyncEvent};
pub use frame::{DataSource, FrameHeader, SourceMask};
pub use pipeline::{MatchedPair, PairedSynchronizer};
pub use session::{FrameNotice, Session, SessionStats, ShutdownHandle};
pub use setup::{configure_sensor, select_device_mode, SensorSetup};
pub use slot::{BufferHandle, FrameOutcome, FrameUpdate, SingleSourceSlot};
