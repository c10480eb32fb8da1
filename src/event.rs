//! Runtime events for monitoring synchronization health.
//!
//! Events are notifications, not control flow. The session keeps running after
//! every event except [`SyncEvent::InvariantViolation`], which accompanies a
//! fatal error that has already stopped it.

use std::sync::Arc;

use crate::channel::{ChannelStatus, GroupId};
use crate::frame::{DataSource, SourceMask};

/// Runtime events emitted while frames flow.
///
/// # Example
///
/// ```
/// use stereo_sync::SyncEvent;
///
/// fn handle_event(event: SyncEvent) {
///     match event {
///         SyncEvent::GroupStarted { group, sources } => {
///             eprintln!("{group} streaming {sources}");
///         }
///         SyncEvent::FrameDiscarded { group, data_source, frame_id } => {
///             eprintln!("{group}: {data_source} frame {frame_id} never matched");
///         }
///         SyncEvent::ConfigWarning { setting, status } => {
///             eprintln!("could not apply {setting}: {status}");
///         }
///         SyncEvent::InvariantViolation { group, error } => {
///             eprintln!("{group}: {error}");
///         }
///         SyncEvent::ShutdownCompleted { handles_released } => {
///             eprintln!("released {handles_released} buffers");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A group's callback was registered and its streams started.
    GroupStarted {
        /// The group.
        group: GroupId,
        /// Sources the group's callback accepts.
        sources: SourceMask,
    },

    /// A pending frame was overwritten before its partner arrived.
    ///
    /// Its buffer was released and it was never visible to consumers. Occasional
    /// discards are normal when the two sources drift; a steady stream of them
    /// means one source is dropping frames.
    FrameDiscarded {
        /// Group of the synchronizer.
        group: GroupId,
        /// Source of the discarded frame.
        data_source: DataSource,
        /// Id of the discarded frame.
        frame_id: i64,
    },

    /// A best-effort sensor setting could not be applied.
    ConfigWarning {
        /// Name of the setting.
        setting: &'static str,
        /// Status code returned by the channel.
        status: ChannelStatus,
    },

    /// A fatal contract breach stopped the session.
    InvariantViolation {
        /// Group whose callback detected it.
        group: GroupId,
        /// Description of the error.
        error: String,
    },

    /// The session released every held buffer.
    ShutdownCompleted {
        /// Number of buffers returned to the pool.
        handles_released: usize,
    },
}

/// Callback type for receiving runtime events.
///
/// Register one via [`StereoSyncBuilder::on_event()`]. The callback runs on the
/// channel's callback threads and must not block.
///
/// [`StereoSyncBuilder::on_event()`]: crate::StereoSyncBuilder::on_event
pub type EventCallback = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use stereo_sync::{event_callback, SyncEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(SyncEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
